pub mod fingerprint;
pub mod headers;
pub mod ip;
pub mod request;

pub use fingerprint::Fingerprint;
pub use headers::{forwarded, names, NormalizedHeaders};
pub use ip::{cidr_contains, client_ip, strip_port, IpRule};
pub use request::RequestView;
