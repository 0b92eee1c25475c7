// tests/store_flow.rs
//
// Library-level flow over the JSON file store: ingest, like, recommend,
// then reopen the file and check everything survived.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use event_recommender::categorize::Categorizer;
use event_recommender::config::Settings;
use event_recommender::ingest::raw::RawEvent;
use event_recommender::ingest::IngestPipeline;
use event_recommender::model::OnboardingAnswers;
use event_recommender::profile::{ProfileBuilder, ProfileService};
use event_recommender::recommend::{Ranker, Recommender};
use event_recommender::store::{DocumentStore, DynStore, EventFilter, JsonFileStore};
use event_recommender::vectorize::{FieldVectorizer, FIELD_GENRES, FIELD_MAIN_CATEGORIES};

struct Services {
    pipeline: IngestPipeline,
    profiles: Arc<ProfileService>,
    recommender: Recommender,
}

fn services(settings: &Settings, store: DynStore) -> Services {
    let categorizer = Arc::new(Categorizer::keyword_only(settings).expect("categorizer"));
    let pipeline = IngestPipeline::new(
        store.clone(),
        categorizer,
        FieldVectorizer::new(&settings.catalog),
    );
    let builder = Arc::new(ProfileBuilder::new(&settings.catalog, &settings.profile));
    let profiles = Arc::new(ProfileService::new(store.clone(), builder));
    let recommender = Recommender::new(store, profiles.clone(), Ranker::new(settings));
    Services {
        pipeline,
        profiles,
        recommender,
    }
}

fn raw(id: &str, name: &str, start: &str) -> RawEvent {
    RawEvent {
        event_id: Some(id.into()),
        name: Some(name.into()),
        start_time: Some(start.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn json_store_round_trips_catalogue_and_profile() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("store.json");
    let settings = Settings::builtin();

    {
        let store: DynStore = Arc::new(JsonFileStore::open(&path).await.expect("open empty"));
        let svc = services(&settings, store.clone());

        let report = svc
            .pipeline
            .run(vec![
                raw("theatre", "Comedy theatre premiere", "2030-03-01 19:00:00"),
                raw("rock", "Rock concert", "2030-03-02 20:00:00"),
                raw("lecture", "Lecture on modern art", "2030-03-03 10:00:00"),
            ])
            .await
            .expect("ingest");
        assert_eq!(report.stored, 3);

        store
            .put_onboarding(
                "u",
                OnboardingAnswers {
                    categories: vec!["Вистави".into()],
                    preferred_times: vec!["Вечір".into()],
                    ..Default::default()
                },
            )
            .await
            .expect("onboarding");

        let ids = svc.recommender.recommend("u", None).await.expect("recommend");
        assert_eq!(ids.first().map(String::as_str), Some("theatre"));

        let liked_at = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let smoothed = svc
            .profiles
            .record_like("u", "rock", liked_at)
            .await
            .expect("like")
            .expect("event exists");
        let mc = &smoothed[FIELD_MAIN_CATEGORIES];
        assert!((mc.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    assert!(path.exists(), "store file written on first mutation");

    let reopened: DynStore = Arc::new(JsonFileStore::open(&path).await.expect("reopen"));
    let events = reopened
        .list_events(&EventFilter::with_vectors())
        .await
        .expect("events");
    assert_eq!(events.len(), 3);
    let rock = reopened.get_event("rock").await.unwrap().expect("rock kept");
    assert_eq!(rock.main_categories, vec!["music"]);
    assert_eq!(rock.genres, vec!["rock"]);
    assert!(rock.component_vectors.as_ref().is_some_and(|v| v.contains_key(FIELD_GENRES)));

    let likes = reopened.list_liked("u").await.unwrap();
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].event_id, "rock");

    let user = reopened.get_user("u").await.unwrap().expect("profile persisted");
    assert!(user.component_profile_vectors.contains_key(FIELD_MAIN_CATEGORIES));

    // similar-to-last-liked still works on the reopened file
    let svc = services(&settings, reopened);
    let similar = svc
        .recommender
        .similar_to_last_liked("u", Some(5))
        .await
        .expect("similar")
        .expect("has a vectorized like");
    assert_eq!(similar.reference_event_id, "rock");
    assert_eq!(similar.event_ids.len(), 2);
}

#[tokio::test]
async fn missing_file_opens_empty_and_corrupt_file_errors() {
    let dir = tempfile::tempdir().expect("tempdir");

    let empty = JsonFileStore::open(dir.path().join("absent.json"))
        .await
        .expect("missing file is an empty store");
    assert!(empty.list_events(&EventFilter::default()).await.unwrap().is_empty());

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{ not json").unwrap();
    assert!(JsonFileStore::open(&bad).await.is_err());
}

#[tokio::test]
async fn failed_write_leaves_store_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocked = dir.path().join("sub");
    let store = JsonFileStore::open(blocked.join("store.json"))
        .await
        .expect("missing file is an empty store");

    // the parent directory cannot be created over a regular file
    std::fs::write(&blocked, "x").unwrap();
    let answers = OnboardingAnswers {
        categories: vec!["Концерти".into()],
        ..Default::default()
    };
    assert!(store.put_onboarding("u", answers.clone()).await.is_err());
    assert!(store.get_onboarding("u").await.unwrap().is_none());

    std::fs::remove_file(&blocked).unwrap();
    store.put_onboarding("u", answers).await.expect("write succeeds");
    assert!(store.get_onboarding("u").await.unwrap().is_some());
}
