use std::sync::Arc;

use futures::StreamExt;
use kube::api::DynamicObject;
use kube::runtime::watcher::{self, watcher, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client};

use super::monitor::{key_of, log_monitor_resource};
use crate::reconcile::{ReconcileOutcome, Reconciler};

/// Watch LogMonitor resources and reconcile each one that changes.
///
/// Events are handled one at a time, so reconciliations of the same key
/// never overlap. Watch errors are retried with backoff; the loop only ends
/// when the watch stream does.
pub async fn run_controller(client: Client, namespace: Option<String>, reconciler: Arc<Reconciler>) {
    let resource = log_monitor_resource();
    let api: Api<DynamicObject> = match &namespace {
        Some(ns) => Api::namespaced_with(client, ns, &resource),
        None => Api::all_with(client, &resource),
    };

    tracing::info!(
        namespace = namespace.as_deref().unwrap_or("*"),
        kind = %resource.kind,
        "Monitor controller started"
    );

    let mut events = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = events.next().await {
        let object = match event {
            Ok(Event::Apply(object)) | Ok(Event::InitApply(object)) | Ok(Event::Delete(object)) => object,
            Ok(Event::Init) | Ok(Event::InitDone) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Monitor watch error");
                continue;
            }
        };

        let Some(key) = key_of(&object) else {
            continue;
        };

        match reconciler.reconcile(&key).await {
            Ok(ReconcileOutcome::Failed { retry_times }) => {
                tracing::debug!(monitor = %key, retry_times, "Reconcile failed, status updated");
            }
            Ok(outcome) => {
                tracing::debug!(monitor = %key, ?outcome, "Reconciled");
            }
            Err(e) => {
                tracing::error!(monitor = %key, error = %e, "Reconcile error");
            }
        }
    }

    tracing::info!("Monitor controller stopped");
}
