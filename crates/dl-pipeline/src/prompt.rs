//! Prompt construction for the vision-language model.
//!
//! Pure and deterministic: the same detections and addendum always produce
//! the same prompt.

use dl_protocol::Detection;

const HEADER: &str =
    "주어진 도로 이미지와 객체 인식 결과를 기반으로 주행 전략과 근거를 JSON 형식으로 제시하세요.";

/// Marker line preceding the serialized detections.
pub const DETECTIONS_MARKER: &str = "객체 인식 결과:";

/// Fixed instructions demanding a `{"strategy", "reason"}` object.
pub const INSTRUCTIONS: &str = r#"조건:
- 안전을 최우선으로 고려할 것
- strategy(전략)는 구체적인 주행 지시를 자연어로 출력
- reason(근거)는 왜 이런 전략을 세웠는지 간단히 설명
- 반드시 JSON 형식으로 출력할 것

출력 예시:
{
  "strategy": "왼쪽 차선에 포트홀이 있으므로 중앙 차선으로 이동하세요.",
  "reason": "탐지 결과 왼쪽 차선에서 포트홀이 확인되어 차량 손상을 방지하기 위해 회피가 필요합니다."
}"#;

/// Marker line preceding the operator's free-text addendum.
pub const ADDENDUM_MARKER: &str = "추가 요청:";

/// Build the instruction prompt for one pipeline run.
///
/// Detections are embedded as pretty-printed JSON (non-ASCII kept as-is);
/// an empty slice embeds `[]`. A non-blank addendum is appended verbatim
/// after [`ADDENDUM_MARKER`].
pub fn build_prompt(detections: &[Detection], addendum: Option<&str>) -> String {
    let detections_text = serde_json::to_string_pretty(detections)
        .expect("detections contain only strings and floats");

    let mut prompt = format!("{HEADER}\n\n{DETECTIONS_MARKER}\n{detections_text}\n\n{INSTRUCTIONS}");

    if let Some(extra) = addendum.filter(|a| !a.trim().is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(ADDENDUM_MARKER);
        prompt.push('\n');
        prompt.push_str(extra);
    }

    prompt
}
