use super::*;

#[test]
fn config_survives_a_json_round_trip() {
    let config = Config::new(Provider::OpenAI, "gpt-5-mini");
    let json = serde_json::to_string_pretty(&config).unwrap();
    let restored: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.model_name, "gpt-5-mini");
    assert!(matches!(restored.provider, Provider::OpenAI));
}

#[test]
fn config_file_lives_in_the_tool_directory_under_home() {
    let path = Config::file_path().unwrap();
    assert!(path.ends_with(".hector-ide/config.json"));
}
