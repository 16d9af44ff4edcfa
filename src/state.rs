use std::sync::Arc;
use tokio::runtime::Handle;

use crate::gateway::{EventFeed, LocalGateway, SharedGateway};
use crate::models::SupervisorConfig;
use crate::services::Supervisor;

pub type AppState = Arc<Supervisor>;

/// 组装本机后端和协调器，并启动轮询与事件转发
pub fn new_state(config: SupervisorConfig) -> AppState {
    let runtime = Handle::current();
    let (events, event_rx) = EventFeed::channel();
    let gateway: SharedGateway = Arc::new(LocalGateway::new(events, runtime.clone()));

    let supervisor = Arc::new(Supervisor::new(config, gateway, runtime.clone()));
    runtime.spawn(supervisor.logs.clone().forward(event_rx));
    supervisor.start(&runtime);
    supervisor
}
