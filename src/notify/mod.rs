//! Notification routing synchronization
//!
//! Keeps one receiver and one route per monitor in the Alertmanager
//! configuration document.

pub mod document;
pub mod duration;
pub mod keyed;
pub mod store;
pub mod sync;

pub use document::{AlertmanagerConfig, DocumentError, EmailConfig, Receiver, Route, WebhookConfig};
pub use keyed::{remove_keyed, upsert_keyed, Keyed, Upserted};
pub use store::{InMemoryNotificationStore, NotificationStore, StoreError, StoredDocument};
pub use sync::{NotificationSynchronizer, NotifyError, NotifySettings, SyncOutcome};
