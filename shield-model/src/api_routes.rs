macro_rules! v1_path {
    ($path:literal) => {
        concat!("/api/v1", $path)
    };
}

/// Push channel endpoint, served outside the versioned API tree.
pub const WS: &str = "/ws";

/// Versioned API route definitions consumed by the sync layer
pub mod v1 {
    pub mod scans {
        /// `POST` creates a scan, `GET` lists scan history.
        pub const COLLECTION: &str = v1_path!("/scans");
        pub const ITEM: &str = v1_path!("/scans/{id}");
    }
}

/// Fill the `{id}` placeholder of a templated route.
pub fn with_id(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}
