use log::{debug, info, warn};
use std::time::Instant;
use surf::middleware::{Middleware, Next};
use surf::{Client, Request, Response};

use crate::request_url::redact;

/// Logs every outgoing request and the status it came back with.
///
/// Signing parameters are redacted from the logged URL.
pub struct SurfLogging;

#[surf::utils::async_trait]
impl Middleware for SurfLogging {
    async fn handle(&self, req: Request, client: Client, next: Next<'_>) -> surf::Result<Response> {
        let method = req.method();
        let url = redact(req.url());
        debug!("{} {}", method, url);

        let start = Instant::now();
        match next.run(req, client).await {
            Ok(res) => {
                let status = res.status();
                if status.is_success() {
                    info!("{} {} -> {} ({:?})", method, url, status, start.elapsed());
                } else {
                    warn!("{} {} -> {} ({:?})", method, url, status, start.elapsed());
                }
                Ok(res)
            }
            Err(err) => {
                warn!("{} {} failed after {:?}: {}", method, url, start.elapsed(), err);
                Err(err)
            }
        }
    }
}
