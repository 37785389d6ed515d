pub mod request_url;
pub mod surf_logging;
