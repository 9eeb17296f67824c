use geotag_core::config::{LocationConfig, RangePolicy};
use geotag_core::error::{LocationError, TagError};
use geotag_core::locator::{build_registry, LocationProvider, SourceAvailability, Variant};
use geotag_core::models::FixSource;
use geotag_core::tagger::TaggingEngine;
use providers::{LocationSource, ProviderError, Reading, SourceKind, SourceRegistry};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Script = fn() -> Result<Reading, ProviderError>;

/// Records every call into a shared log, then answers from a script.
struct FakeSource {
    name: &'static str,
    kind: SourceKind,
    script: Script,
    log: Arc<Mutex<Vec<&'static str>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn new(
        name: &'static str,
        kind: SourceKind,
        script: Script,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind,
            script,
            log: log.clone(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl LocationSource for FakeSource {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn locate(&self, _timeout: Duration) -> Result<Reading, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(self.name);
        (self.script)()
    }
}

fn reading(lat: f64, lng: f64, provider: &str) -> Reading {
    Reading {
        latitude: lat,
        longitude: lng,
        provider: provider.to_string(),
    }
}

fn timeout() -> Result<Reading, ProviderError> {
    Err(ProviderError::Timeout(Duration::from_secs(30)))
}

fn unavailable() -> Result<Reading, ProviderError> {
    Err(ProviderError::Unavailable("not installed".into()))
}

fn provider_of(sources: Vec<Arc<FakeSource>>, policy: RangePolicy) -> LocationProvider {
    let registry = sources
        .into_iter()
        .fold(SourceRegistry::new(), |r, s| r.with_source(s));
    LocationProvider::new(registry, policy)
}

#[tokio::test]
async fn primary_timeout_falls_back_to_secondary() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let primary = FakeSource::new("sl4a", SourceKind::PrimaryService, timeout, &log);
    let secondary = FakeSource::new(
        "termux-location",
        SourceKind::SecondaryService,
        || Ok(reading(34.123456, -118.123454, "gps")),
        &log,
    );
    let provider = provider_of(vec![primary, secondary], RangePolicy::PassThrough);

    let fix = provider.acquire(Duration::from_secs(30)).await.unwrap();
    assert_eq!(fix.source(), FixSource::SecondaryService);
    assert_eq!(fix.tag_suffix().as_str(), "_Lat_34.12346_Lng_-118.12345");
    assert_eq!(*log.lock().unwrap(), vec!["sl4a", "termux-location"]);
}

#[tokio::test]
async fn first_valid_fix_stops_the_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let primary = FakeSource::new(
        "sl4a",
        SourceKind::PrimaryService,
        || Ok(reading(1.0, 2.0, "network")),
        &log,
    );
    let secondary = FakeSource::new(
        "termux-location",
        SourceKind::SecondaryService,
        || Ok(reading(3.0, 4.0, "gps")),
        &log,
    );
    let provider = provider_of(vec![primary, secondary.clone()], RangePolicy::PassThrough);

    let fix = provider.acquire(Duration::from_secs(30)).await.unwrap();
    assert_eq!(fix.source(), FixSource::PrimaryService);
    assert_eq!(fix.provider(), "network");
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn exhausted_chain_reports_timeout_or_unavailable() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let provider = provider_of(
        vec![
            FakeSource::new("sl4a", SourceKind::PrimaryService, timeout, &log),
            FakeSource::new("termux-location", SourceKind::SecondaryService, unavailable, &log),
        ],
        RangePolicy::PassThrough,
    );
    match provider.acquire(Duration::from_secs(1)).await {
        Err(LocationError::Timeout { attempted }) => {
            assert_eq!(attempted, vec!["sl4a", "termux-location"])
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    let provider = provider_of(
        vec![FakeSource::new(
            "termux-location",
            SourceKind::SecondaryService,
            unavailable,
            &log,
        )],
        RangePolicy::PassThrough,
    );
    assert!(matches!(
        provider.acquire(Duration::from_secs(1)).await,
        Err(LocationError::SourceUnavailable { .. })
    ));

    let empty = LocationProvider::new(SourceRegistry::new(), RangePolicy::PassThrough);
    match empty.acquire(Duration::from_secs(1)).await {
        Err(LocationError::SourceUnavailable { attempted }) => assert!(attempted.is_empty()),
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_primary_reading_degrades_to_next_stage() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let provider = provider_of(
        vec![
            FakeSource::new(
                "sl4a",
                SourceKind::PrimaryService,
                || Err(ProviderError::Malformed("gps: missing numeric `latitude`".into())),
                &log,
            ),
            FakeSource::new(
                "termux-location",
                SourceKind::SecondaryService,
                || Ok(reading(5.0, 6.0, "gps")),
                &log,
            ),
        ],
        RangePolicy::PassThrough,
    );
    let fix = provider.acquire(Duration::from_secs(1)).await.unwrap();
    assert_eq!((fix.latitude(), fix.longitude()), (5.0, 6.0));
}

#[tokio::test]
async fn range_policy_controls_out_of_range_readings() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let out_of_range: Script = || Ok(reading(91.5, -190.0, "gps"));

    let pass = provider_of(
        vec![FakeSource::new("sl4a", SourceKind::PrimaryService, out_of_range, &log)],
        RangePolicy::PassThrough,
    );
    let fix = pass.acquire(Duration::from_secs(1)).await.unwrap();
    assert_eq!(fix.tag_suffix().as_str(), "_Lat_91.50000_Lng_-190.00000");

    let clamp = provider_of(
        vec![FakeSource::new("sl4a", SourceKind::PrimaryService, out_of_range, &log)],
        RangePolicy::Clamp,
    );
    let fix = clamp.acquire(Duration::from_secs(1)).await.unwrap();
    assert_eq!(fix.tag_suffix().as_str(), "_Lat_90.00000_Lng_-180.00000");

    let reject = provider_of(
        vec![FakeSource::new("sl4a", SourceKind::PrimaryService, out_of_range, &log)],
        RangePolicy::Reject,
    );
    assert!(matches!(
        reject.acquire(Duration::from_secs(1)).await,
        Err(LocationError::SourceUnavailable { .. })
    ));
}

#[tokio::test]
async fn no_fix_means_no_files_touched() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.jpg"), "a").unwrap();
    fs::write(dir.path().join("b.jpg"), "b").unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let provider = provider_of(
        vec![
            FakeSource::new("sl4a", SourceKind::PrimaryService, timeout, &log),
            FakeSource::new("termux-location", SourceKind::SecondaryService, unavailable, &log),
        ],
        RangePolicy::PassThrough,
    );
    let err = TaggingEngine::new()
        .tag_directory(&provider, dir.path(), Duration::from_secs(1), false)
        .await
        .unwrap_err();
    assert!(matches!(err, TagError::Location(LocationError::Timeout { .. })));

    let mut names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.jpg", "b.jpg"]);
}

#[tokio::test]
async fn missing_directory_is_checked_before_locating() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let source = FakeSource::new(
        "sl4a",
        SourceKind::PrimaryService,
        || Ok(reading(1.0, 2.0, "gps")),
        &log,
    );
    let provider = provider_of(vec![source.clone()], RangePolicy::PassThrough);

    let err = TaggingEngine::new()
        .tag_directory(&provider, &dir.path().join("gone"), Duration::from_secs(1), false)
        .await
        .unwrap_err();
    assert!(matches!(err, TagError::DirectoryNotFound(_)));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn full_run_tags_with_the_acquired_fix() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("IMG_0001.jpg"), "x").unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let provider = provider_of(
        vec![FakeSource::new(
            "termux-location",
            SourceKind::SecondaryService,
            || Ok(reading(-33.8688, 151.2093, "gps")),
            &log,
        )],
        RangePolicy::PassThrough,
    );
    let run = TaggingEngine::new()
        .tag_directory(&provider, dir.path(), Duration::from_secs(1), false)
        .await
        .unwrap();
    assert_eq!(run.summary.renamed, 1);
    assert_eq!(run.suffix.as_str(), "_Lat_-33.86880_Lng_151.20930");
    assert!(dir
        .path()
        .join("IMG_0001_Lat_-33.86880_Lng_151.20930.jpg")
        .exists());
}

#[tokio::test]
async fn production_chain_never_includes_the_network_estimate() {
    let cfg = LocationConfig::default();
    let registry = build_registry(&cfg, &SourceAvailability::default(), Variant::Production).await;
    assert!(registry.is_empty());

    let availability = SourceAvailability {
        sl4a: None,
        termux: Some("/usr/bin/termux-location".into()),
    };
    let registry = build_registry(&cfg, &availability, Variant::Production).await;
    assert_eq!(registry.names(), vec!["termux-location"]);

    let registry = build_registry(&cfg, &availability, Variant::Simulated).await;
    assert_eq!(registry.names(), vec!["ip-api"]);
}
