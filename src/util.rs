const PIPELINE_SEED: &str = "FAULT_PIPELINE_SEED";

pub fn get_seed() -> Option<u64> {
    let seed_from_env = std::env::var(PIPELINE_SEED);
    seed_from_env.ok().and_then(|res| res.parse().ok())
}

const PIPELINE_CONFIG: &str = "FAULT_PIPELINE_CONFIG";

pub fn get_config_path() -> Option<String> {
    let path_from_env = std::env::var(PIPELINE_CONFIG);
    path_from_env.ok().filter(|path| !path.is_empty())
}
