//! The volume import workflow.
//!
//! [`VolumeImporter`] runs the five [`Phase`]s in order: pick a zone, fetch the
//! manifest, submit the conversion task, wait for it, then resolve the volume
//! and wait for it to become available. The first failure ends the run.

use tokio::time::Instant;
use tracing::{Instrument, Span, info, info_span};

use crate::compute::{ComputeClient, DiskImageDetail, ImportVolumeRequest, VolumeDetail};
use crate::config::{VolimportConfig, WaitSettings};
use crate::error::ProvisionError;
use crate::manifest::{ImageManifest, ManifestSource};
use crate::provision::{Phase, ProvisionRecord, ProvisionRun};
use crate::waiter::{self, WaiterConfig};

const AVAILABLE: &str = "available";

/// Wait budgets for the two polling phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImporterSettings {
    pub import_wait: WaitSettings,
    pub volume_wait: WaitSettings,
}

impl From<&VolimportConfig> for ImporterSettings {
    fn from(config: &VolimportConfig) -> Self {
        Self {
            import_wait: config.import_wait,
            volume_wait: config.volume_wait,
        }
    }
}

/// Drives a volume import through all five phases.
///
/// Holds no per-run state, so one importer can serve concurrent imports.
pub struct VolumeImporter<C, M> {
    client: C,
    manifests: M,
    settings: ImporterSettings,
    /// Parent span for every event the importer emits.
    span: Span,
}

impl<C: ComputeClient, M: ManifestSource> VolumeImporter<C, M> {
    pub fn new(client: C, manifests: M, settings: ImporterSettings) -> Self {
        let span = info_span!("volume_importer", region = %client.region());
        Self {
            client,
            manifests,
            settings,
            span,
        }
    }

    /// Replaces the span the importer logs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Imports the manifest at `manifest_url` and returns the id of the
    /// available volume.
    pub async fn create(&self, manifest_url: &str) -> Result<String, ProvisionError> {
        let record = self.create_with_record(manifest_url).await?;
        Ok(record.volume_id)
    }

    /// Like [`create`](Self::create) but returns the full run record.
    pub async fn create_with_record(
        &self,
        manifest_url: &str,
    ) -> Result<ProvisionRecord, ProvisionError> {
        let mut run = ProvisionRun::new(manifest_url.to_string());
        let span = info_span!(
            parent: &self.span,
            "create",
            run_id = %run.run_id,
            manifest_url
        );

        let started = Instant::now();
        let result = self.run_phases(&mut run).instrument(span.clone()).await;
        info!(
            parent: &span,
            "completed create in {:.2} minutes",
            started.elapsed().as_secs_f64() / 60.0
        );

        if let Err(e) = result {
            info!(parent: &span, phase = %e.phase(), kind = %e.kind(), "import failed: {e}");
            return Err(e);
        }

        ProvisionRecord::from_run(&run).ok_or(ProvisionError::MissingIdentifier {
            phase: Phase::ResolveVolume,
            what: "volume ID",
        })
    }

    async fn run_phases(&self, run: &mut ProvisionRun) -> Result<(), ProvisionError> {
        let manifest_url = run.manifest_url.clone();

        let zone = self.locate_placement().await?;
        run.availability_zone = Some(zone.clone());
        run.complete(Phase::LocatePlacement);

        let manifest = self.manifests.fetch(&manifest_url).await?;
        info!(
            file_format = %manifest.file_format,
            volume_size_gb = manifest.volume_size_gb,
            "fetched manifest"
        );
        run.complete(Phase::FetchManifest);

        let task_id = self.submit_import(&zone, &manifest_url, &manifest).await?;
        run.conversion_task_id = Some(task_id.clone());
        run.complete(Phase::SubmitImport);

        self.wait_for_import(&task_id).await?;
        run.complete(Phase::WaitForImport);

        let volume_id = self.resolve_volume(&task_id).await?;
        run.volume_id = Some(volume_id);
        run.complete(Phase::ResolveVolume);

        Ok(())
    }

    /// Picks the first available zone in service order.
    async fn locate_placement(&self) -> Result<String, ProvisionError> {
        let zones = self
            .client
            .describe_availability_zones(AVAILABLE)
            .await
            .map_err(ProvisionError::ListZones)?;

        let zone = zones
            .into_iter()
            .map(|z| z.zone_name)
            .find(|name| !name.is_empty())
            .ok_or_else(|| ProvisionError::NoAvailabilityZones {
                region: self.client.region().to_string(),
            })?;
        info!(availability_zone = %zone, "selected availability zone");
        Ok(zone)
    }

    async fn submit_import(
        &self,
        zone: &str,
        manifest_url: &str,
        manifest: &ImageManifest,
    ) -> Result<String, ProvisionError> {
        let req = ImportVolumeRequest {
            availability_zone: zone.to_string(),
            image: DiskImageDetail {
                import_manifest_url: manifest_url.to_string(),
                format: manifest.file_format.clone(),
                bytes: manifest.volume_size_gb,
            },
            volume: VolumeDetail {
                size: manifest.volume_size_gb,
            },
        };

        let out = self
            .client
            .import_volume(&req)
            .await
            .map_err(ProvisionError::Submit)?;

        out.conversion_task
            .and_then(|task| task.conversion_task_id)
            .filter(|id| !id.is_empty())
            .ok_or(ProvisionError::MissingIdentifier {
                phase: Phase::SubmitImport,
                what: "conversion task ID",
            })
    }

    async fn wait_for_import(&self, task_id: &str) -> Result<(), ProvisionError> {
        info!("waiting on ImportVolume task {task_id}");
        let wait = self.settings.import_wait;
        let config = WaiterConfig::conversion_task_completed(wait.delay(), wait.max_attempts);

        let ids = [task_id.to_string()];
        let ids = &ids[..];
        let started = Instant::now();
        let result = waiter::wait(|| self.client.describe_conversion_tasks(ids), &config).await;
        info!(
            "waited on import task {task_id} for {:.2} minutes",
            started.elapsed().as_secs_f64() / 60.0
        );

        result.map_err(|source| ProvisionError::ImportWait {
            task_id: task_id.to_string(),
            source,
        })
    }

    /// Reads the volume id off the completed task and waits for it to be available.
    async fn resolve_volume(&self, task_id: &str) -> Result<String, ProvisionError> {
        let out = self
            .client
            .describe_conversion_tasks(&[task_id.to_string()])
            .await
            .map_err(|source| ProvisionError::DescribeTask {
                task_id: task_id.to_string(),
                source,
            })?;

        let volume_id = out
            .conversion_tasks
            .first()
            .and_then(|task| task.volume_id())
            .map(str::to_string)
            .ok_or(ProvisionError::MissingIdentifier {
                phase: Phase::ResolveVolume,
                what: "volume ID",
            })?;

        info!("waiting for volume to be available: {volume_id}");
        let wait = self.settings.volume_wait;
        let config = WaiterConfig::volume_available(wait.delay(), wait.max_attempts);

        let started = Instant::now();
        let result = self
            .client
            .wait_until_volume_available(&volume_id, &config)
            .await;
        info!(
            "waited on volume {volume_id} for {:.2} seconds",
            started.elapsed().as_secs_f64()
        );

        result.map_err(|source| ProvisionError::VolumeWait {
            volume_id: volume_id.clone(),
            source,
        })?;
        Ok(volume_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::types::{
        DescribeConversionTasksOutput, DescribeVolumesOutput, DiskImageVolumeDescription,
        ImportVolumeOutput, ImportVolumeTaskDetails,
    };
    use crate::compute::{
        AvailabilityZone, ClientError, ConversionTask, ConversionTaskState, Volume, VolumeState,
    };
    use crate::error::FailureKind;
    use crate::manifest::ManifestError;
    use crate::waiter::WaitError;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    /// Scripted compute service. Each describe call pops the next task state,
    /// repeating the last one.
    struct MockCompute {
        zones: Vec<&'static str>,
        task_id: Option<&'static str>,
        task_states: Vec<ConversionTaskState>,
        volume_id: Option<&'static str>,
        volume_state: VolumeState,
        polls: Mutex<usize>,
        submitted: Mutex<Option<ImportVolumeRequest>>,
        log: CallLog,
    }

    impl MockCompute {
        fn new(log: CallLog) -> Self {
            Self {
                zones: vec!["us-east-1a", "us-east-1b"],
                task_id: Some("import-1"),
                task_states: vec![
                    ConversionTaskState::Active,
                    ConversionTaskState::Active,
                    ConversionTaskState::Completed,
                ],
                volume_id: Some("vol-123"),
                volume_state: VolumeState::Available,
                polls: Mutex::new(0),
                submitted: Mutex::new(None),
                log,
            }
        }

        fn task_polls(&self) -> usize {
            *self.polls.lock().unwrap()
        }
    }

    impl ComputeClient for MockCompute {
        fn region(&self) -> &str {
            "us-east-1"
        }

        async fn describe_availability_zones(
            &self,
            state: &str,
        ) -> Result<Vec<AvailabilityZone>, ClientError> {
            assert_eq!(state, "available");
            self.log.lock().unwrap().push("zones");
            Ok(self
                .zones
                .iter()
                .map(|name| AvailabilityZone {
                    zone_name: name.to_string(),
                    state: "available".into(),
                    region_name: None,
                })
                .collect())
        }

        async fn import_volume(
            &self,
            req: &ImportVolumeRequest,
        ) -> Result<ImportVolumeOutput, ClientError> {
            self.log.lock().unwrap().push("import");
            *self.submitted.lock().unwrap() = Some(req.clone());
            Ok(ImportVolumeOutput {
                conversion_task: Some(ConversionTask {
                    conversion_task_id: self.task_id.map(String::from),
                    state: Some(ConversionTaskState::Active),
                    ..Default::default()
                }),
            })
        }

        async fn describe_conversion_tasks(
            &self,
            task_ids: &[String],
        ) -> Result<DescribeConversionTasksOutput, ClientError> {
            assert_eq!(task_ids, ["import-1"]);
            self.log.lock().unwrap().push("describe_task");
            let state = {
                let mut polls = self.polls.lock().unwrap();
                let state = self.task_states[(*polls).min(self.task_states.len() - 1)];
                *polls += 1;
                state
            };
            let import_volume = (state == ConversionTaskState::Completed).then(|| {
                ImportVolumeTaskDetails {
                    availability_zone: Some("us-east-1a".into()),
                    volume: Some(DiskImageVolumeDescription {
                        id: self.volume_id.map(String::from),
                        size: Some(4),
                    }),
                }
            });
            Ok(DescribeConversionTasksOutput {
                conversion_tasks: vec![ConversionTask {
                    conversion_task_id: Some("import-1".into()),
                    state: Some(state),
                    status_message: None,
                    import_volume,
                }],
            })
        }

        async fn describe_volumes(
            &self,
            volume_ids: &[String],
        ) -> Result<DescribeVolumesOutput, ClientError> {
            self.log.lock().unwrap().push("describe_volume");
            Ok(DescribeVolumesOutput {
                volumes: volume_ids
                    .iter()
                    .map(|id| Volume {
                        volume_id: id.clone(),
                        state: self.volume_state,
                        availability_zone: None,
                    })
                    .collect(),
            })
        }
    }

    struct MockManifests {
        result: Result<ImageManifest, &'static str>,
        log: CallLog,
    }

    impl ManifestSource for MockManifests {
        async fn fetch(&self, _url: &str) -> Result<ImageManifest, ManifestError> {
            self.log.lock().unwrap().push("manifest");
            match &self.result {
                Ok(m) => Ok(m.clone()),
                Err(msg) => Err(ManifestError::Invalid(msg.to_string())),
            }
        }
    }

    fn vmdk_manifest() -> ImageManifest {
        ImageManifest {
            file_format: "VMDK".into(),
            volume_size_gb: 4,
        }
    }

    fn settings(delay_secs: u64, max_attempts: u32) -> ImporterSettings {
        let wait = WaitSettings {
            delay_secs,
            max_attempts,
        };
        ImporterSettings {
            import_wait: wait,
            volume_wait: wait,
        }
    }

    fn importer_with(
        configure: impl FnOnce(&mut MockCompute),
        settings: ImporterSettings,
    ) -> (VolumeImporter<MockCompute, MockManifests>, CallLog) {
        let log = CallLog::default();
        let mut compute = MockCompute::new(log.clone());
        configure(&mut compute);
        let manifests = MockManifests {
            result: Ok(vmdk_manifest()),
            log: log.clone(),
        };
        (VolumeImporter::new(compute, manifests, settings), log)
    }

    const URL: &str = "https://images.example.com/stemcell/manifest.xml";

    #[tokio::test(start_paused = true)]
    async fn happy_path_returns_volume_id() {
        let (importer, log) = importer_with(|_| {}, settings(15, 40));

        let volume_id = importer.create(URL).await.unwrap();
        assert_eq!(volume_id, "vol-123");
        assert_eq!(importer.client().task_polls(), 4); // three polls plus the resolve describe

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            [
                "zones",
                "manifest",
                "import",
                "describe_task",
                "describe_task",
                "describe_task",
                "describe_task",
                "describe_volume"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn submission_uses_first_zone_and_manifest_fields() {
        let (importer, _log) = importer_with(|_| {}, settings(15, 40));
        importer.create(URL).await.unwrap();

        let req = importer.client().submitted.lock().unwrap().clone().unwrap();
        assert_eq!(req.availability_zone, "us-east-1a");
        assert_eq!(req.image.import_manifest_url, URL);
        assert_eq!(req.image.format, "VMDK");
        assert_eq!(req.image.bytes, 4);
        assert_eq!(req.volume.size, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn record_lists_every_phase() {
        let (importer, _log) = importer_with(|_| {}, settings(15, 40));
        let record = importer.create_with_record(URL).await.unwrap();
        assert_eq!(record.phases, Phase::ALL);
        assert_eq!(record.availability_zone, "us-east-1a");
        assert_eq!(record.conversion_task_id, "import-1");
        assert_eq!(record.manifest_url, URL);
    }

    #[tokio::test]
    async fn no_zones_fails_before_fetching_manifest() {
        let (importer, log) = importer_with(|c| c.zones.clear(), settings(15, 40));

        let err = importer.create(URL).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::NoAvailabilityZones { ref region } if region == "us-east-1"
        ));
        assert_eq!(err.kind(), FailureKind::Discovery);
        assert_eq!(*log.lock().unwrap(), ["zones"]);
    }

    #[tokio::test]
    async fn manifest_error_stops_before_submission() {
        let log = CallLog::default();
        let importer = VolumeImporter::new(
            MockCompute::new(log.clone()),
            MockManifests {
                result: Err("truncated"),
                log: log.clone(),
            },
            settings(15, 40),
        );

        let err = importer.create(URL).await.unwrap_err();
        assert_eq!(err.phase(), Phase::FetchManifest);
        assert_eq!(err.kind(), FailureKind::Input);
        assert_eq!(*log.lock().unwrap(), ["zones", "manifest"]);
    }

    #[tokio::test]
    async fn missing_task_id_fails_without_polling() {
        let (importer, log) = importer_with(|c| c.task_id = None, settings(15, 40));

        let err = importer.create(URL).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::MissingIdentifier {
                phase: Phase::SubmitImport,
                what: "conversion task ID"
            }
        ));
        assert_eq!(importer.client().task_polls(), 0);
        assert_eq!(*log.lock().unwrap(), ["zones", "manifest", "import"]);
    }

    #[tokio::test]
    async fn empty_task_id_is_treated_as_missing() {
        let (importer, _log) = importer_with(|c| c.task_id = Some(""), settings(15, 40));
        let err = importer.create(URL).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Invariant);
        assert_eq!(importer.client().task_polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_fails_on_second_poll() {
        let (importer, _log) = importer_with(
            |c| {
                c.task_states = vec![ConversionTaskState::Active, ConversionTaskState::Cancelled]
            },
            settings(15, 40),
        );

        let err = importer.create(URL).await.unwrap_err();
        assert_eq!(importer.client().task_polls(), 2);
        assert_eq!(err.phase(), Phase::WaitForImport);
        assert_eq!(err.kind(), FailureKind::WaitFailure);
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_task_is_a_failure() {
        let (importer, _log) = importer_with(
            |c| c.task_states = vec![ConversionTaskState::Cancelling],
            settings(15, 40),
        );

        let err = importer.create(URL).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::ImportWait {
                source: WaitError::Failure { ref state, .. },
                ..
            } if state == "cancelling"
        ));
        assert_eq!(importer.client().task_polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn import_wait_times_out_after_max_attempts() {
        let (importer, log) = importer_with(
            |c| c.task_states = vec![ConversionTaskState::Active],
            settings(15, 3),
        );

        let started = Instant::now();
        let err = importer.create(URL).await.unwrap_err();

        assert_eq!(importer.client().task_polls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        match err {
            ProvisionError::ImportWait {
                task_id,
                source: WaitError::Timeout { attempts, .. },
            } => {
                assert_eq!(task_id, "import-1");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected import timeout, got {other:?}"),
        }
        assert!(!log.lock().unwrap().contains(&"describe_volume"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_volume_id_is_invariant_error() {
        let (importer, log) = importer_with(
            |c| {
                c.task_states = vec![ConversionTaskState::Completed];
                c.volume_id = None;
            },
            settings(15, 40),
        );

        let err = importer.create(URL).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::MissingIdentifier {
                phase: Phase::ResolveVolume,
                what: "volume ID"
            }
        ));
        assert!(!log.lock().unwrap().contains(&"describe_volume"));
    }

    #[tokio::test(start_paused = true)]
    async fn volume_error_state_is_propagated() {
        let (importer, _log) = importer_with(
            |c| {
                c.task_states = vec![ConversionTaskState::Completed];
                c.volume_state = VolumeState::Error;
            },
            settings(15, 40),
        );

        let err = importer.create(URL).await.unwrap_err();
        match err {
            ProvisionError::VolumeWait { volume_id, source } => {
                assert_eq!(volume_id, "vol-123");
                assert!(matches!(source, WaitError::Failure { .. }));
            }
            other => panic!("expected volume wait error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn volume_wait_times_out() {
        let (importer, log) = importer_with(
            |c| {
                c.task_states = vec![ConversionTaskState::Completed];
                c.volume_state = VolumeState::Creating;
            },
            settings(5, 4),
        );

        let err = importer.create(URL).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::WaitTimeout);
        assert_eq!(err.phase(), Phase::ResolveVolume);
        let volume_polls = log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == "describe_volume")
            .count();
        assert_eq!(volume_polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_imports_share_one_importer() {
        let (importer, _log) = importer_with(
            |c| c.task_states = vec![ConversionTaskState::Completed],
            settings(1, 5),
        );

        let (a, b) = tokio::join!(importer.create(URL), importer.create(URL));
        assert_eq!(a.unwrap(), "vol-123");
        assert_eq!(b.unwrap(), "vol-123");
    }

    #[test]
    fn settings_from_config() {
        let mut config = VolimportConfig::default();
        config.import_wait.max_attempts = 7;
        let settings = ImporterSettings::from(&config);
        assert_eq!(settings.import_wait.max_attempts, 7);
        assert_eq!(settings.volume_wait, config.volume_wait);
    }
}
