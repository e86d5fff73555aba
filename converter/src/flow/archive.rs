use std::sync::Arc;

use log::error;

use super::{FlowState, Pass, Trigger, read_bytes};
use crate::archive::{ARCHIVE_MEDIA_TYPE, package_single_async};
use crate::download::{Delivery, Download, DownloadSink};
use crate::error::{ConvertError, UserInputError};
use crate::job::ArchiveRequest;
use crate::media::FileSelection;
use crate::naming::archive_download_name;
use crate::status::{StatusKind, StatusLine};

/// Packs a single file into a zip and saves it.
pub struct ArchiveFlow {
    sink: Arc<dyn DownloadSink>,
    status: Arc<StatusLine>,
    trigger: Trigger,
}

impl ArchiveFlow {
    pub fn new(sink: Arc<dyn DownloadSink>, status: Arc<StatusLine>) -> Self {
        ArchiveFlow {
            sink,
            status,
            trigger: Trigger::new(),
        }
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub async fn convert(&self, request: ArchiveRequest) -> Result<Delivery, ConvertError> {
        if !self.trigger.is_enabled() {
            return Err(UserInputError::Busy.into());
        }

        let mut pass = Pass::begin("archive");
        let Some(file) = request.file.as_ref() else {
            return Err(pass.reject(&self.status, UserInputError::NoFile));
        };
        let Some(_guard) = self.trigger.try_disable() else {
            pass.finish(FlowState::Failed);
            return Err(UserInputError::Busy.into());
        };

        pass.advance(FlowState::Processing);
        self.status
            .set(StatusKind::Processing, format!("Packaging {}...", file.name));

        match self.process(file).await {
            Ok(delivery) => {
                self.status.set(
                    StatusKind::Success,
                    format!("Archive ready! {} is downloading.", delivery.file_name),
                );
                pass.finish(FlowState::Succeeded);
                Ok(delivery)
            }
            Err(detail) => {
                error!("Archive packaging error: {}", detail);
                self.status.set(StatusKind::Error, "Packaging failed.");
                pass.finish(FlowState::Failed);
                Err(ConvertError::Conversion(detail))
            }
        }
    }

    async fn process(&self, file: &FileSelection) -> Result<Delivery, String> {
        let bytes = read_bytes(file).await?;
        let archive = package_single_async(file.name.clone(), bytes)
            .await
            .map_err(|e| format!("Failed to package {}: {}", file.name, e))?;

        self.sink
            .deliver(Download {
                file_name: archive_download_name(&file.name),
                media_type: ARCHIVE_MEDIA_TYPE.to_string(),
                bytes: archive,
            })
            .await
    }
}
