pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> String;
    fn database_url(&self) -> Option<String>;
    /// Secret the bearer tokens are signed with.
    fn app_secret(&self) -> String;
    /// Base url the avatar files are served from.
    fn files_url(&self) -> String;
}
