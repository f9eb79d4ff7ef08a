//! Report delivery.
//!
//! Two triggers feed the same coordinator: the weekly [`scheduler`] and the
//! on-demand [`command`] listener. The coordinator holds a single build lock,
//! so concurrent requests queue instead of writing the same file in parallel.

pub mod command;
pub mod scheduler;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{DeliveryError, ReportResult};
use crate::report::{ReportArtifact, ReportAssembler};
use crate::telegram::{ChatTransport, Document};

pub use command::{CommandListener, CommandOutcome, ReportCommand};
pub use scheduler::ReportScheduler;

/// Something that produces a finished report.
#[async_trait]
pub trait ReportBuilder: Send + Sync {
    async fn build_report(&self) -> ReportResult<ReportArtifact>;
}

#[async_trait]
impl ReportBuilder for ReportAssembler {
    async fn build_report(&self) -> ReportResult<ReportArtifact> {
        self.build().await
    }
}

/// Builds a report and sends it to a chat.
pub struct ReportDelivery {
    builder: Arc<dyn ReportBuilder>,
    transport: Arc<dyn ChatTransport>,
    build_lock: Mutex<()>,
}

impl ReportDelivery {
    pub fn new(builder: Arc<dyn ReportBuilder>, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            builder,
            transport,
            build_lock: Mutex::new(()),
        }
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Build the report and send it to `chat_id`, returning the file name.
    ///
    /// Only one build runs at a time; the lock is held until the document has
    /// been sent and the file handle released.
    pub async fn deliver(&self, chat_id: i64) -> Result<String, DeliveryError> {
        let _guard = self.build_lock.lock().await;
        debug!(chat_id, "Report build lock acquired");

        let artifact = self.builder.build_report().await?;
        let file_name = artifact.file_name();
        let sheets = artifact.sheet_names.len();
        let bytes = artifact.read_all().await?;

        self.transport
            .send_document(
                chat_id,
                Document {
                    file_name: file_name.clone(),
                    bytes,
                },
            )
            .await?;

        info!(chat_id, file = %file_name, sheets, "Report delivered");
        Ok(file_name)
    }
}
