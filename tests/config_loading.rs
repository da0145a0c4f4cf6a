// tests/config_loading.rs
use motion_forge::{AnimatorConfig, ConfigError, EditorConfig, MotionSession};

#[test]
fn empty_file_gives_defaults() {
    assert_eq!(EditorConfig::from_toml_str("").unwrap(), EditorConfig::default());
}

#[test]
fn partial_sections_keep_other_defaults() {
    let config = EditorConfig::from_toml_str(
        r#"
        [parser]
        call_names = ["moveArms"]

        [collision]
        min_overlap = 0.02

        [manipulator]
        linear_sensitivity = -0.005
        "#,
    )
    .unwrap();

    assert_eq!(config.parser.call_names, ["moveArms"]);
    assert_eq!(config.parser.shutdown_flag, 2);
    assert_eq!(config.collision.min_overlap, 0.02);
    assert_eq!(config.collision.body_suffix, "_link");
    assert_eq!(config.manipulator.linear_sensitivity, -0.005);
    assert_eq!(config.manipulator.steps_per_radian, 20.0);
    assert_eq!(config.animator, AnimatorConfig::default());

    let mut session = MotionSession::new(config);
    assert!(session.load_script("update(300, {0,0,0,0,0,0,0,0,0}, s, 1.0f);").is_err());
    assert!(session.load_script("moveArms(300, {0,0,0,0,0,0,0,0,0}, s, 1.0f);").is_ok());
}

#[test]
fn malformed_toml_is_an_error() {
    let err = EditorConfig::from_toml_str("[collision]\nmin_overlap = \"wide\"").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn missing_file_names_the_path() {
    let err = EditorConfig::load("/definitely/not/here/motion.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("motion.toml"));
}
