// tests/parse_scripts.rs
use approx::assert_relative_eq;
use motion_forge::{
    BlockId, DiagnosticKind, EvalError, MotionScriptParser, ParseError, ParserConfig, parse,
    parse_bytes,
};

const ARM_SCRIPT: &str = r#"
constexpr float kPi = 3.141592654;
constexpr float kPi_2 = 1.57079632;

// Startup pose
std::array<float, 9> init_pos{0.29f, 0, 0, 0.1f, // left arm
                              0.29f, 0, 0, 0.1f,
                              0};

std::array<float, 9> wave_up = {-kPi_2/2, 0.3f, 0, kPi_2 - 0.2f,
                                0.29f, 0, 0, 0.1f,
                                0};

std::array<float, 9> wave_down{0.1f, 0.3f, 0, 0.5f, 0.29f, 0, 0, 0.1f, 0};

std::array<float, 9> unused_pose = {0, 0, 0, 0, 0, 0, 0, 0, 0};

int main() {
    updateJointPositions(700, init_pos, current_jpos_des, phase_koef, msg, arm_joints, arm_sdk_publisher, 1);
    updateJointPositions(1000, wave_up, current_jpos_des, 1.5f, msg, arm_joints, arm_sdk_publisher);
    updateJointPositions(800, wave_down, current_jpos_des, 1, msg, arm_joints, arm_sdk_publisher);
    updateJointPositions(1200, wave_up, current_jpos_des, 2.0f, msg, arm_joints, arm_sdk_publisher);
    updateJointPositions(600, {0, 0, 0, 0.2f, 0, 0, 0, 0.2f, 0.5f}, current_jpos_des, 1.2f, msg, arm_joints, arm_sdk_publisher); // look left
    updateJointPositions(600, {0, 0, 0, 0, 0, 0, 0, 0, -0.5f}, current_jpos_des, 1.2f, msg, arm_joints, arm_sdk_publisher);
    updateJointPositions(450, target_pos8, current_jpos_des, phase_koef, msg, arm_joints, arm_sdk_publisher, 2);
}
"#;

#[test]
fn single_named_array() {
    let src = "float arr[9] = {0.29f,0,0,0.1f,0.29f,0,0,0.1f,0};\n\
               update(500, arr, current_jpos_des, 1.2f, msg);";
    let seq = parse(src).unwrap();

    assert_eq!(seq.len(), 3);
    let block = &seq.user_blocks()[0];
    assert_eq!(block.name, "arr");
    assert_eq!(
        block.positions.as_array(),
        &[0.29, 0.0, 0.0, 0.1, 0.29, 0.0, 0.0, 0.1, 0.0]
    );
    assert_eq!(block.duration_ms, 500);
    assert_relative_eq!(block.nonlinearity, 1.2);
    assert!(!block.is_system);
}

#[test]
fn wrong_sized_arrays_are_dropped_not_fatal() {
    let src = r#"
        float eight[] = {1, 2, 3, 4, 5, 6, 7, 8};
        float ten[] = {1, 2, 3, 4, 5, 6, 7, 8, 9, 10};
        float nine[] = {0, 0, 0, 0, 0, 0, 0, 0, 0};
        update(500, eight, s, 1.0f);
        update(500, ten, s, 1.0f);
        update(500, nine, s, 1.0f);
    "#;
    let parsed = MotionScriptParser::default().parse(src).unwrap();

    assert_eq!(parsed.blocks.len(), 1);
    assert_eq!(parsed.blocks[0].name, "nine");
    let dropped: Vec<_> = parsed
        .diagnostics
        .iter()
        .filter_map(|d| match &d.kind {
            DiagnosticKind::WrongCellCount { array, cells } => Some((array.as_str(), *cells)),
            _ => None,
        })
        .collect();
    assert_eq!(dropped, [("eight", 8), ("ten", 10)]);
}

#[test]
fn arm_sdk_program() {
    let parsed = MotionScriptParser::default().parse(ARM_SCRIPT).unwrap();
    let names: Vec<_> = parsed.blocks.iter().map(|b| b.name.as_str()).collect();
    // Named arrays in declaration order, then inline arrays in call order.
    assert_eq!(names, ["wave_up", "wave_down", "look left", "inline_2"]);

    // A named array takes its first call.
    let up = &parsed.blocks[0];
    assert_eq!(up.duration_ms, 1000);
    assert_relative_eq!(up.nonlinearity, 1.5);
    assert_relative_eq!(up.positions.as_array()[0], -0.78539816, epsilon = 1e-6);
    assert_relative_eq!(up.positions.as_array()[3], 1.37079632, epsilon = 1e-6);

    assert_relative_eq!(parsed.blocks[1].nonlinearity, 1.0);
    assert_relative_eq!(parsed.blocks[3].positions.as_array()[8], -0.5);

    assert_eq!(parsed.init_duration_ms, Some(700));
    assert_eq!(parsed.shutdown_duration_ms, Some(450));
    assert!(parsed.diagnostics.iter().any(|d| d.kind
        == DiagnosticKind::UnreferencedArray {
            array: "unused_pose".into()
        }));

    let seq = parsed.into_sequence();
    assert_eq!(seq.init().duration_ms, 700);
    assert_eq!(seq.shutdown().duration_ms, 450);
    assert_eq!(seq.blocks()[0].id, BlockId::Init);
    assert_eq!(seq.blocks()[5].id, BlockId::Shutdown);
}

#[test]
fn unresolvable_cells_default_to_zero() {
    let src = "float p[9] = {mystery, 0.5f, 0, 0, 0, 0, 0, 0, 0};\nupdate(500, p, s, 1.0f);";
    let parsed = MotionScriptParser::default().parse(src).unwrap();

    assert_eq!(parsed.blocks[0].positions.as_array()[0], 0.0);
    assert_eq!(parsed.blocks[0].positions.as_array()[1], 0.5);
    assert!(matches!(
        &parsed.diagnostics[0].kind,
        DiagnosticKind::UnresolvedCell { array, cell: 0, .. } if array == "p"
    ));
    assert_eq!(parsed.diagnostics[0].line, 1);
}

#[test]
fn calls_after_keywords_are_motions() {
    let src = r#"
        void update(int steps, std::array<float, 9> target, float koef) {}
        float p[9] = {0, 0, 0, 1.0f, 0, 0, 0, 0, 0};
        int main() {
            if (fast) update(300, p, s, 1.0f);
            else update(900, {0, 0, 0, 0.5f, 0, 0, 0, 0, 0}, s, 1.0f); // slow
            do update(400, {0, 0, 0, 0, 0, 0, 0, 0, 0}, s, 2.0f); while (false);
        }
    "#;
    let parsed = MotionScriptParser::default().parse(src).unwrap();
    let durations: Vec<_> = parsed.blocks.iter().map(|b| b.duration_ms).collect();
    assert_eq!(durations, [300, 900, 400]);
    assert_eq!(parsed.blocks[1].name, "slow");
}

#[test]
fn runaway_nesting_only_loses_its_cell() {
    let deep = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
    let src = format!(
        "float a[9] = {{{deep}, 0.5f, 0, 0, 0, 0, 0, 0, 0}};\nupdate(500, a, x, 1.2f, m);"
    );
    let parsed = MotionScriptParser::default().parse(&src).unwrap();

    assert_eq!(parsed.blocks.len(), 1);
    assert_eq!(parsed.blocks[0].positions.as_array()[0], 0.0);
    assert_eq!(parsed.blocks[0].positions.as_array()[1], 0.5);
    assert!(matches!(
        &parsed.diagnostics[0].kind,
        DiagnosticKind::UnresolvedCell { cell: 0, error: EvalError::TooDeep(_), .. }
    ));
}

#[test]
fn out_of_range_values_are_reported() {
    let src = "float p[9] = {0, 0, 0, 3.5f, 0, 0, 0, 0, 0};\nupdate(20, p, s, 9.0f);";
    let parsed = MotionScriptParser::default().parse(src).unwrap();
    let block = &parsed.blocks[0];

    assert_eq!(block.duration_ms, 100);
    assert_relative_eq!(block.nonlinearity, 5.0);
    // Positions are kept as written; editing clamps them.
    assert_relative_eq!(block.positions.as_array()[3], 3.5);
    assert_eq!(parsed.diagnostics.len(), 3);
}

#[test]
fn calls_with_non_literal_nonlinearity_are_not_motions() {
    let src = "float p[9] = {0, 0, 0, 0, 0, 0, 0, 0, 0};\nupdate(500, p, s, koef);";
    let parsed = MotionScriptParser::default().parse(src).unwrap();
    assert!(parsed.blocks.is_empty());
    assert!(
        parsed
            .diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::MalformedCall { .. }))
    );
}

#[test]
fn unreadable_input() {
    assert_eq!(
        parse_bytes(&[0x66, 0x6c, 0xff, 0x00]),
        Err(ParseError::NotText { offset: 2 })
    );
    assert!(matches!(
        parse("int main() { return 0; }"),
        Err(ParseError::NoPoseCalls { .. })
    ));
}

#[test]
fn custom_call_names() {
    let parser = MotionScriptParser::new(ParserConfig {
        call_names: vec!["move_arms".into()],
        ..Default::default()
    });
    let src = "move_arms(300, {0, 0, 0, 0, 0, 0, 0, 0, 0}, s, 1.0f);";
    let parsed = parser.parse(src).unwrap();
    assert_eq!(parsed.blocks.len(), 1);
    assert_eq!(parsed.blocks[0].name, "inline_1");

    assert!(parser.parse("update(300, {0,0,0,0,0,0,0,0,0}, s, 1.0f);").is_err());
}
