//! Live reloading of the template path cache.
//!
//! Watches the view root and rebuilds the resolver's cache when template
//! files change, so renamed or added views become visible without a
//! restart. The rebuild is synchronous inside the watcher callback: once it
//! runs, the next dispatched request sees the fresh snapshot. If the rescan
//! fails the previous cache stays active and the error is logged.
//!
//! Intended for development; production deployments typically scan once at
//! boot and never reload.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use tracing::{error, info};

use crate::templates::TemplateResolver;

/// Watch the resolver's view root and rebuild its cache on changes.
///
/// The callback receives the fresh template count after each successful
/// rebuild so the caller can log or invalidate dependent state. Drop the
/// returned watcher to stop watching.
pub fn watch_views<F>(
    resolver: Arc<TemplateResolver>,
    mut on_reload: F,
) -> notify::Result<RecommendedWatcher>
where
    F: FnMut(usize) + Send + 'static,
{
    let root = resolver.root().to_path_buf();
    let watch_root = root.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    match resolver.reload() {
                        Ok(count) => {
                            info!(
                                root = %watch_root.display(),
                                templates = count,
                                "hot-reload: template path cache rebuilt"
                            );
                            on_reload(count);
                        }
                        Err(err) => {
                            error!(
                                root = %watch_root.display(),
                                error = %err,
                                "hot-reload: rescan failed, keeping previous cache"
                            );
                        }
                    }
                }
            }
            Err(err) => error!(error = %err, "hot-reload: watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    Ok(watcher)
}
