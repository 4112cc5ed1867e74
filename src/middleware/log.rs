use tracing::info;

use super::Middleware;
use crate::request::Request;
use crate::response::Response;

/// Logs method, path and peer address of every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRequest;

impl Middleware for LogRequest {
    fn handle(&self, req: &Request, _res: &mut Response) {
        info!(method = %req.method(), path = req.path(), peer = %req.remote_addr(), "request");
    }
}

/// Logs a marker once the handler has produced its response.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogResponse;

impl Middleware for LogResponse {
    fn handle(&self, _req: &Request, res: &mut Response) {
        info!(status = res.status_code().as_u16(), "response sent");
    }
}
