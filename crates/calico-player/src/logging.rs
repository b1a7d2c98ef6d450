use tokio::sync::broadcast;

/// Tracing layer that forwards WARN and ERROR lines to the front-end footer.
pub struct FooterLayer {
    sender: broadcast::Sender<String>,
}

impl FooterLayer {
    pub fn new(sender: broadcast::Sender<String>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for FooterLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        event.record(&mut MessageVisitor(&mut message));

        // No receivers (front-end not up yet) is fine.
        let _ = self.sender.send(message);
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn only_warnings_and_errors_reach_the_footer() {
        let (tx, mut rx) = broadcast::channel(8);
        let subscriber = tracing_subscriber::registry().with(FooterLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("quiet");
            tracing::warn!(track = "A", "Rating failed");
            tracing::error!("Stream gone");
        });

        let first = rx.try_recv().unwrap();
        assert!(first.contains("[WARN] Rating failed"), "{}", first);
        assert!(first.ends_with(" track=\"A\""), "{}", first);
        assert!(rx.try_recv().unwrap().contains("[ERROR] Stream gone"));
        assert!(rx.try_recv().is_err());
    }
}
