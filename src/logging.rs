use env_logger::{Builder, Env};

pub fn init() {
    let env = Env::default().filter_or("DIGITPAD_LOG", "info");
    // a second init (tests, embedding) is harmless
    let _ = Builder::from_env(env).format_timestamp_millis().try_init();
}
