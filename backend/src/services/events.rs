//! In-process event bus for catalog changes
//!
//! A single broadcast channel fans events out to every open subscription.
//! Subscribers only see events published after they subscribed; dropping the
//! returned stream unsubscribes.

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

use super::catalog::BookWithAuthor;

/// Events published by the catalog
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    BookAdded(BookWithAuthor),
}

/// Event bus configuration
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Events buffered per subscriber before a slow subscriber starts skipping
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Cloneable handle to the process-wide catalog event channel
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self { sender }
    }

    /// Deliver an event to every current subscriber.
    ///
    /// Returns how many subscribers received it. Having none is not an error.
    pub fn publish(&self, event: CatalogEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Catalog event dropped, no subscribers");
                0
            }
        }
    }

    /// Subscribe to all catalog events from now on
    pub fn subscribe(&self) -> impl Stream<Item = CatalogEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Subscriber lagged behind, events skipped");
                None
            }
        })
    }

    /// Subscribe to newly added books only
    pub fn book_added(&self) -> impl Stream<Item = BookWithAuthor> + Send + 'static {
        self.subscribe().map(|event| match event {
            CatalogEvent::BookAdded(book) => book,
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::{AuthorRecord, BookRecord};

    fn sample(title: &str) -> BookWithAuthor {
        BookWithAuthor {
            book: BookRecord {
                id: format!("{}-id", title),
                title: title.to_string(),
                published: 1965,
                author_id: "author-1".to_string(),
                genres: vec!["sci-fi".to_string()],
                created_at: "now".to_string(),
            },
            author: AuthorRecord {
                id: "author-1".to_string(),
                name: "Herbert".to_string(),
                born: None,
                books: vec![format!("{}-id", title)],
                created_at: "now".to_string(),
                updated_at: "now".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::default();
        let mut first = Box::pin(bus.book_added());
        let mut second = Box::pin(bus.book_added());

        assert_eq!(bus.publish(CatalogEvent::BookAdded(sample("Dune"))), 2);

        assert_eq!(first.next().await.unwrap().book.title, "Dune");
        assert_eq!(second.next().await.unwrap().book.title, "Dune");
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_no_backlog() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(CatalogEvent::BookAdded(sample("Dune"))), 0);

        let mut late = Box::pin(bus.book_added());
        let next = tokio::time::timeout(Duration::from_millis(50), late.next()).await;
        assert!(next.is_err(), "late subscriber must not receive past events");

        bus.publish(CatalogEvent::BookAdded(sample("Emma")));
        assert_eq!(late.next().await.unwrap().book.title, "Emma");
    }

    #[tokio::test]
    async fn test_dropping_a_subscription_leaves_others_alone() {
        let bus = EventBus::default();
        let dropped = Box::pin(bus.book_added());
        let mut kept = Box::pin(bus.book_added());
        assert_eq!(bus.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(bus.subscriber_count(), 1);

        assert_eq!(bus.publish(CatalogEvent::BookAdded(sample("Dune"))), 1);
        assert_eq!(kept.next().await.unwrap().book.title, "Dune");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_and_continues() {
        let bus = EventBus::new(EventBusConfig { capacity: 2 });
        let mut slow = Box::pin(bus.book_added());

        for title in ["A", "B", "C", "D"] {
            bus.publish(CatalogEvent::BookAdded(sample(title)));
        }

        assert_eq!(slow.next().await.unwrap().book.title, "C");
        assert_eq!(slow.next().await.unwrap().book.title, "D");
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(EventBusConfig { capacity: 64 });
        let mut sub = Box::pin(bus.book_added());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    bus.publish(CatalogEvent::BookAdded(sample(&format!("Book {}", i))));
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..8 {
            received.push(sub.next().await.unwrap().book.title);
        }
        received.sort();
        assert_eq!(received.len(), 8);
        assert_eq!(received[0], "Book 0");
    }
}
