use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SEARCH_URL: &str =
    "https://www1.sedecatastro.gob.es/CYCBienInmueble/OVCBusqueda.aspx";
const DEFAULT_OTHER_VIEWERS_URL: &str =
    "https://www1.sedecatastro.gob.es/Cartografia/BuscarParcelaInternet.aspx?refcat=";

#[derive(Debug, Clone)]
pub struct CatastroConfig {
    /// Directory Chrome downloads into; artifacts are written here too
    pub download_dir: PathBuf,
    pub headless: bool,
    /// Leave the browser open after the run (debugging)
    pub keep_session_open: bool,
    pub chrome_executable: Option<PathBuf>,
    pub search_url: String,
    /// Prefix of the "other viewers" page; the cadastral reference is appended
    pub other_viewers_url: String,
    /// How long an element lookup waits for the element to appear
    pub implicit_wait: Duration,
    /// Consent prompts are optional, so their lookup gives up early
    pub consent_wait: Duration,
    pub new_tab_timeout: Duration,
    pub render_timeout: Duration,
    pub download_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for CatastroConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./downloads"),
            headless: true,
            keep_session_open: false,
            chrome_executable: None,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            other_viewers_url: DEFAULT_OTHER_VIEWERS_URL.to_string(),
            implicit_wait: Duration::from_secs(30),
            consent_wait: Duration::from_secs(3),
            new_tab_timeout: Duration::from_secs(10),
            render_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl CatastroConfig {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `CATASTRO_DOWNLOAD_DIR`, `CATASTRO_HEADLESS`,
    /// `CATASTRO_KEEP_OPEN` and `CHROME_PATH` / `CHROMIUM_PATH`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CATASTRO_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(headless) = env_flag("CATASTRO_HEADLESS") {
            config.headless = headless;
        }
        if let Some(keep) = env_flag("CATASTRO_KEEP_OPEN") {
            config.keep_session_open = keep;
        }
        config.chrome_executable = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .ok()
            .map(PathBuf::from);

        config
    }

    pub fn with_download_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_dir = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_keep_session_open(mut self, keep: bool) -> Self {
        self.keep_session_open = keep;
        self
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    pub fn with_other_viewers_url(mut self, url: impl Into<String>) -> Self {
        self.other_viewers_url = url.into();
        self
    }

    pub fn with_implicit_wait(mut self, wait: Duration) -> Self {
        self.implicit_wait = wait;
        self
    }

    pub fn with_consent_wait(mut self, wait: Duration) -> Self {
        self.consent_wait = wait;
        self
    }

    pub fn with_new_tab_timeout(mut self, timeout: Duration) -> Self {
        self.new_tab_timeout = timeout;
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// URL of the "other viewers" page for one parcel
    pub fn other_viewers_url_for(&self, cadastral_ref: &str) -> String {
        format!("{}{}", self.other_viewers_url, cadastral_ref)
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
