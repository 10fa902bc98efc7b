/// Transport-level capabilities attached to a single download.
///
/// An open set of independent booleans rather than a mode enum; new
/// capabilities compose without touching existing call sites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Tolerate a failed transfer when the sink already holds usable local
    /// data: the transport error is downgraded to success and the partial
    /// transfer is discarded.
    pub accept_local_files: bool,

    /// Mark the cached result as never expiring.
    pub make_eternal: bool,
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn accept_local_files(mut self, accept: bool) -> Self {
        self.accept_local_files = accept;
        self
    }

    #[must_use]
    pub fn make_eternal(mut self, eternal: bool) -> Self {
        self.make_eternal = eternal;
        self
    }
}
