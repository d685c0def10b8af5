use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::flow::Coordinator;

/// Общее состояние бота, передаётся во все обработчики.
///
/// Координатор один на процесс и защищён мьютексом: обработчики работают с
/// данными строго по очереди, каждый до конца.
#[derive(Clone)]
pub struct BotState {
    coordinator: Arc<Mutex<Coordinator>>,
}

impl BotState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
        }
    }

    pub async fn run<T>(&self, action: impl FnOnce(&mut Coordinator) -> T) -> T {
        let start_time = Instant::now();
        let mut coordinator = self.coordinator.lock().await;
        let result = action(&mut coordinator);
        log::debug!("⏱️ Handled in {:?}", start_time.elapsed());
        result
    }
}
