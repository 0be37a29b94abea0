use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;

use crate::captions::CaptionGenerator;
use crate::publisher::Publisher;
use crate::storage::MediaStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Client>>,
    pub publisher: Arc<dyn Publisher + Send + Sync>,
    pub captions: Arc<CaptionGenerator>,
    pub media: MediaStore,
    pub upload_max_bytes: u64,
}
