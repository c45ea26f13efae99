/// One-way requests to the host process. No reply is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    /// Add a visit for `url` to the browsing history.
    RecordHistory { url: String, manual: bool },
    /// Save the media. `ext` is the fallback extension when the URL has none.
    Download { url: String, ext: String },
    OpenTabs { urls: Vec<String>, background: bool },
}

pub trait HostChannel {
    fn send(&mut self, request: HostRequest);
}
