use tokio::sync::mpsc;

/// 后端异步推送的文本事件流
#[derive(Debug, Clone)]
pub struct EventFeed {
    tx: mpsc::UnboundedSender<String>,
}

impl EventFeed {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, line: impl Into<String>) {
        let line = line.into();
        log::info!("{}", line);
        // 接收端关闭后事件直接丢弃
        let _ = self.tx.send(line);
    }
}
