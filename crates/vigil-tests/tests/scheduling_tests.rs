//! Compose and update scheduling against in-memory services.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use vigil_core::artifact::{Asset, AssetKind, TestRequest, UNIVERSAL_FLAVOR};
use vigil_core::job::{JobOutcome, JobState};
use vigil_core::{Error, JobId, RuleBook};
use vigil_scheduler::releases::UNKNOWN_RELEASE;
use vigil_scheduler::{
    ComposeScheduler, ComposeTrigger, DuplicateGuard, SelectionFilter, UpdateScheduler,
    UpdateTarget, UpdateTrigger,
};
use vigil_tests::{
    ArtifactFixture, COMPOSE_ID, COMPOSE_LOCATION, FakeExecution, FakeMetadata, JobFixture,
    ReleaseAnswer, ReleaseFixture, init_test_logging,
};

fn rules() -> Arc<RuleBook> {
    Arc::new(RuleBook::builtin().unwrap())
}

fn compose_scheduler(api: &Arc<FakeExecution>, metadata: FakeMetadata) -> ComposeScheduler {
    ComposeScheduler::new(rules(), api.clone(), Arc::new(metadata))
}

fn server_release() -> FakeMetadata {
    FakeMetadata::with_release(ReleaseFixture::nightly(vec![
        ArtifactFixture::server_boot(),
        ArtifactFixture::server_dvd(),
    ]))
}

#[tokio::test]
async fn test_scored_shapes_yield_per_artifact_and_universal_requests() {
    init_test_logging();
    let api = Arc::new(FakeExecution::new());
    let scheduler = compose_scheduler(&api, server_release());

    let outcome = scheduler.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap();

    assert_eq!(outcome.build, COMPOSE_ID);
    assert_eq!(outcome.jobs.len(), 3);

    let submitted = api.submitted();
    let flavors: Vec<&str> = submitted.iter().map(|r| r.flavor.as_str()).collect();
    assert_eq!(flavors, vec!["Server-boot-iso", "Server-dvd-iso", UNIVERSAL_FLAVOR]);

    let universal = &submitted[2];
    assert_eq!(universal.arch, "x86_64");
    assert_eq!(universal.params["ISO_URL"], ArtifactFixture::server_dvd().url);
    assert_eq!(universal.params["DISTRI"], "fedora");
    assert_eq!(universal.params["LOCATION"], COMPOSE_LOCATION);
    assert_eq!(universal.params["_ONLY_OBSOLETE_SAME_BUILD"], "1");
    assert_eq!(universal.params["CURRREL"], "41");
    assert_eq!(universal.params["UP1REL"], "40");
}

#[tokio::test]
async fn test_rescheduling_skips_existing_jobs_unless_forced() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = compose_scheduler(&api, server_release());
    let trigger = ComposeTrigger::new(COMPOSE_ID);

    let first = scheduler.schedule(&trigger).await.unwrap();
    let second = scheduler.schedule(&trigger).await.unwrap();
    assert_eq!(first.jobs.len(), 3);
    assert!(second.jobs.is_empty());
    assert_eq!(api.submitted().len(), 3);

    let forced = ComposeTrigger {
        force: true,
        ..ComposeTrigger::new(COMPOSE_ID)
    };
    let third = scheduler.schedule(&forced).await.unwrap();
    assert_eq!(third.jobs.len(), 3);
    assert_eq!(api.submitted().len(), 6);
}

#[tokio::test]
async fn test_cancelled_jobs_do_not_block_rescheduling() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = compose_scheduler(&api, server_release());
    let trigger = ComposeTrigger::new(COMPOSE_ID);

    scheduler.schedule(&trigger).await.unwrap();
    for mut job in api.jobs() {
        job.state = JobState::Cancelled;
        api.insert(job);
    }

    let again = scheduler.schedule(&trigger).await.unwrap();
    assert_eq!(again.jobs.len(), 3);
}

#[tokio::test]
async fn test_production_candidate_gets_specials_and_important_tag() {
    let api = Arc::new(FakeExecution::new());
    let metadata = FakeMetadata::with_release(ReleaseFixture::candidate(vec![
        ArtifactFixture::server_boot(),
        ArtifactFixture::server_dvd(),
    ]));
    let scheduler = compose_scheduler(&api, metadata);

    let outcome = scheduler.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap();

    assert_eq!(outcome.jobs.len(), 5);
    let specials: Vec<(String, String)> = api
        .submitted()
        .iter()
        .filter(|r| r.flavor == "upgrade")
        .map(|r| (r.flavor.clone(), r.arch.clone()))
        .collect();
    assert_eq!(
        specials,
        vec![
            ("upgrade".to_string(), "x86_64".to_string()),
            ("upgrade".to_string(), "aarch64".to_string()),
        ]
    );
    assert!(api.submitted().iter().all(|r| r.params["LABEL"] == "RC-1.2"));
    assert_eq!(
        api.important_tags(),
        vec![(COMPOSE_ID.to_string(), "RC-1.2".to_string())]
    );
}

#[tokio::test]
async fn test_failed_important_tag_does_not_fail_scheduling() {
    let api = Arc::new(FakeExecution::new());
    api.fail_tagging();
    let metadata =
        FakeMetadata::with_release(ReleaseFixture::candidate(vec![ArtifactFixture::server_dvd()]));
    let scheduler = compose_scheduler(&api, metadata);

    let outcome = scheduler.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap();
    assert!(!outcome.jobs.is_empty());
    assert!(api.important_tags().is_empty());
}

#[tokio::test]
async fn test_nightly_is_not_tagged() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = compose_scheduler(&api, server_release());

    scheduler.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap();
    assert!(api.important_tags().is_empty());
}

#[tokio::test]
async fn test_updates_image_marks_build_unreported() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = compose_scheduler(&api, server_release());
    let trigger = ComposeTrigger {
        updates_img: Some("https://people.example/updates.img".to_string()),
        ..ComposeTrigger::new(COMPOSE_ID)
    };

    let outcome = scheduler.schedule(&trigger).await.unwrap();

    assert_eq!(outcome.build, format!("{}-NOREPORT", COMPOSE_ID));
    assert!(vigil_core::is_unreported_build(&outcome.build));
    for request in api.submitted() {
        assert_eq!(request.params["GRUBADD"], "inst.updates=https://people.example/updates.img");
    }
}

#[tokio::test]
async fn test_unsupported_compose_is_empty_outcome() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = compose_scheduler(&api, FakeMetadata::new(ReleaseAnswer::Unsupported));

    let outcome = scheduler.schedule(&ComposeTrigger::new("FedoraRespin-41")).await.unwrap();
    assert!(outcome.jobs.is_empty());
    assert!(api.submitted().is_empty());
}

#[tokio::test]
async fn test_lookup_failures_are_trigger_failures() {
    let api = Arc::new(FakeExecution::new());

    let not_found = compose_scheduler(&api, FakeMetadata::new(ReleaseAnswer::NotFound));
    let err = not_found.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap_err();
    assert!(matches!(err, Error::TriggerFailure(_)));

    let mismatch = compose_scheduler(
        &api,
        FakeMetadata::new(ReleaseAnswer::Mismatch {
            found: "Fedora-41-20241002.0".to_string(),
        }),
    );
    let err = mismatch.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap_err();
    assert!(matches!(err, Error::TriggerFailure(_)));
}

#[tokio::test]
async fn test_url_locator_must_match_release_location() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = compose_scheduler(&api, server_release());

    let err = scheduler
        .schedule(&ComposeTrigger::new("https://mirror.example/compose/other"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TriggerFailure(_)));

    let outcome = scheduler
        .schedule(&ComposeTrigger::new(format!("{}/", COMPOSE_LOCATION)))
        .await
        .unwrap();
    assert_eq!(outcome.jobs.len(), 3);
}

#[tokio::test]
async fn test_no_testable_artifacts_is_trigger_failure() {
    let api = Arc::new(FakeExecution::new());

    let no_artifacts = FakeMetadata::with_release(ReleaseFixture::nightly(vec![]));
    let empty = compose_scheduler(&api, no_artifacts);
    let err = empty.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap_err();
    assert!(matches!(err, Error::TriggerFailure(_)));

    let filtered = compose_scheduler(&api, server_release());
    let trigger = ComposeTrigger {
        filter: SelectionFilter {
            arches: vec!["ppc64le".to_string()],
            flavors: vec![],
        },
        ..ComposeTrigger::new(COMPOSE_ID)
    };
    let err = filtered.schedule(&trigger).await.unwrap_err();
    assert!(matches!(err, Error::TriggerFailure(_)));
    assert!(api.submitted().is_empty());
}

#[tokio::test]
async fn test_release_number_failures_use_sentinel() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = compose_scheduler(&api, server_release().without_release_numbers());

    scheduler.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap();

    let request = &api.submitted()[0];
    assert_eq!(request.params["CURRREL"], UNKNOWN_RELEASE);
    assert_eq!(request.params["RAWREL"], UNKNOWN_RELEASE);
    assert_eq!(request.params["UP1REL"], "40");
}

#[tokio::test]
async fn test_direct_kernel_boot_image() {
    let api = Arc::new(FakeExecution::new());
    let raw = ArtifactFixture::minimal_raw("aarch64");
    let metadata = FakeMetadata::with_release(ReleaseFixture::nightly(vec![raw]));
    let scheduler = compose_scheduler(&api, metadata);

    scheduler.schedule(&ComposeTrigger::new(COMPOSE_ID)).await.unwrap();

    let request = &api.submitted()[0];
    assert_eq!(
        request.asset,
        Some(Asset::new(AssetKind::Hdd, "Fedora-Minimal-41-1.2.aarch64.raw"))
    );
    assert_eq!(
        request.params["HDD_1_DECOMPRESS_URL"],
        ArtifactFixture::minimal_raw("aarch64").url
    );
    assert_eq!(
        request.params["KERNEL"],
        format!("{}/Spins/aarch64/os/images/pxeboot/vmlinuz", COMPOSE_LOCATION)
    );
    assert_eq!(
        request.params["INITRD"],
        format!("{}/Spins/aarch64/os/images/pxeboot/initrd.img", COMPOSE_LOCATION)
    );
}

fn update_scheduler(api: &Arc<FakeExecution>, metadata: FakeMetadata) -> UpdateScheduler {
    UpdateScheduler::new(rules(), api.clone(), Arc::new(metadata))
}

fn gnome_update(version: &str) -> UpdateTrigger {
    let mut trigger = UpdateTrigger::new(
        UpdateTarget::Update {
            advisory: "FEDORA-2024-1a2b3c".to_string(),
        },
        version,
    );
    trigger.critpath = vec!["critical-path-gnome".to_string()];
    trigger
}

#[tokio::test]
async fn test_critical_path_update_schedules_group_flavors() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = update_scheduler(&api, server_release());

    let outcome = scheduler.schedule(&gnome_update("41")).await.unwrap();

    assert_eq!(outcome.build, "Update-FEDORA-2024-1a2b3c");
    assert_eq!(outcome.jobs.len(), 6);
    let request = &api.submitted()[0];
    assert_eq!(request.params["ADVISORY"], "FEDORA-2024-1a2b3c");
    assert_eq!(request.params["VERSION"], "41");
    assert_eq!(request.params["_OBSOLETE"], "1");
    assert!(api.submitted().iter().any(|r| r.flavor == "updates-workstation-upgrade"));
}

#[tokio::test]
async fn test_oldest_release_skips_upgrade_flavors() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = update_scheduler(&api, server_release().with_oldest(41));

    let outcome = scheduler.schedule(&gnome_update("41")).await.unwrap();

    assert_eq!(outcome.jobs.len(), 4);
    assert!(api.submitted().iter().all(|r| !r.flavor.contains("upgrade")));
}

#[tokio::test]
async fn test_rawhide_update_uses_rawhide_number() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = update_scheduler(&api, server_release());

    scheduler.schedule(&gnome_update("Rawhide")).await.unwrap();
    assert!(api.submitted().iter().all(|r| r.params["VERSION"] == "43"));
}

#[tokio::test]
async fn test_update_without_matching_packages_schedules_nothing() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = update_scheduler(&api, server_release());
    let mut trigger = UpdateTrigger::new(UpdateTarget::Task { id: 4242 }, "41");
    trigger.packages = vec!["bash".to_string()];

    let outcome = scheduler.schedule(&trigger).await.unwrap();

    assert_eq!(outcome.build, "Kojitask-4242");
    assert!(outcome.jobs.is_empty());
    assert!(api.submitted().is_empty());
}

#[tokio::test]
async fn test_allow_listed_package_update_is_not_rescheduled() {
    let api = Arc::new(FakeExecution::new());
    let scheduler = update_scheduler(&api, server_release());
    let mut trigger = UpdateTrigger::new(
        UpdateTarget::Copr {
            owner: "alice".to_string(),
            project: "cockpit-nightly".to_string(),
        },
        "41",
    );
    trigger.packages = vec!["cockpit".to_string()];
    trigger.arches = vec!["x86_64".to_string()];

    let first = scheduler.schedule(&trigger).await.unwrap();
    let second = scheduler.schedule(&trigger).await.unwrap();

    assert_eq!(first.jobs.len(), 2);
    assert!(second.jobs.is_empty());
    assert!(api.submitted().iter().all(|r| r.params["COPR"] == "alice/cockpit-nightly"));
}

const DVD_ISO: &str = "Fedora-Server-dvd-x86_64-41-1.2.iso";
const MINIMAL_RAW: &str = "Fedora-Minimal-41-1.2.aarch64.raw";

fn dvd_request() -> TestRequest {
    TestRequest::new("Server-dvd-iso", "x86_64", COMPOSE_ID)
        .with_asset(Asset::new(AssetKind::Iso, DVD_ISO))
}

#[tokio::test]
async fn test_user_cancelled_job_does_not_block_resubmission() {
    let api = Arc::new(FakeExecution::new());
    let guard = DuplicateGuard::new(api.clone());
    api.insert(JobFixture::new(1, "install_default").result(JobOutcome::UserCancelled).build());

    assert!(guard.find_duplicates(&dvd_request()).await.unwrap().is_empty());
    let submitted = guard.submit_all(&[dvd_request()], false).await.unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(api.submitted().len(), 1);
}

#[tokio::test]
async fn test_duplicate_must_share_architecture() {
    let api = Arc::new(FakeExecution::new());
    let guard = DuplicateGuard::new(api.clone());
    api.insert(
        JobFixture::new(1, "install_default")
            .setting("ARCH", "aarch64")
            .build(),
    );

    assert!(guard.find_duplicates(&dvd_request()).await.unwrap().is_empty());

    api.insert(JobFixture::new(2, "install_default").build());
    let duplicates = guard.find_duplicates(&dvd_request()).await.unwrap();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].id, JobId::new(2));
}

#[tokio::test]
async fn test_disk_image_duplicate_is_found_by_hdd_setting() {
    let api = Arc::new(FakeExecution::new());
    let guard = DuplicateGuard::new(api.clone());
    let request = TestRequest::new("Minimal-raw_xz-raw.xz", "aarch64", COMPOSE_ID)
        .with_asset(Asset::new(AssetKind::Hdd, MINIMAL_RAW));
    api.insert(
        JobFixture::new(1, "install_default")
            .setting("FLAVOR", "Minimal-raw_xz-raw.xz")
            .setting("ARCH", "aarch64")
            .setting("ISO", MINIMAL_RAW)
            .build(),
    );

    assert!(guard.find_duplicates(&request).await.unwrap().is_empty());

    api.insert(
        JobFixture::new(2, "install_default")
            .setting("FLAVOR", "Minimal-raw_xz-raw.xz")
            .setting("ARCH", "aarch64")
            .without("ISO")
            .setting("HDD_1", MINIMAL_RAW)
            .build(),
    );
    let duplicates = guard.find_duplicates(&request).await.unwrap();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].setting("HDD_1"), Some(MINIMAL_RAW));
}
