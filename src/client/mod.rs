pub mod api_client;
pub mod cancel;
pub mod flow;
pub mod listeners;
pub mod transport;

pub use api_client::{ApiClient, ErrorCallback};
pub use cancel::CancellationToken;
pub use listeners::{AuthListener, ListenerRegistry};
pub use transport::{OutboundRequest, ReqwestTransport, Transport, TransportResponse};
