//! Instruction preamble and per-ply context message.

use crate::decision::MoveRequest;

pub const SYSTEM_PROMPT: &str = r#"You are playing a game of chess. You must analyze the position and choose a valid move from the legal moves available.

CRITICAL REQUIREMENTS:
1. You MUST use Standard Algebraic Notation (SAN)
2. You MUST choose from the provided list of legal moves
3. Your move MUST be exactly as shown in the legal moves list
4. DO NOT modify or reformat the move notation

Example valid responses:
- For pawn moves: "e4", "d5", "exd5"
- For piece moves: "Nf3", "Bc4", "Qd4"
- For castling: "O-O" (kingside), "O-O-O" (queenside)
- For captures: "Bxe4", "Nxc6", "exd5"
- For checks: "Qd7+", "Nf7+"
- For checkmate: "Qh7#"

Common mistakes to AVOID:
- DO NOT use coordinates format (e2e4)
- DO NOT add unnecessary characters (P-e4, PxP)
- DO NOT modify the notation (E4, N-f3)
- DO NOT add unnecessary details (pawn to e4)

RESPONSE FORMAT REQUIREMENTS:
- You MUST return ONLY a valid JSON object
- DO NOT include any text before or after the JSON
- DO NOT wrap the JSON in code blocks or markdown
- The response should start with { and end with }

Previous game moves and current position will be provided.
Respond with a JSON object containing your move and reasoning:
{
   "move": "<your chosen move in EXACT SAN format>",
   "reasoning": "<your analysis and explanation>"
}"#;

/// The user message for one ply.
pub fn format_prompt(request: &MoveRequest) -> String {
    let history = request
        .history_text()
        .unwrap_or_else(|| "Opening position".to_string());
    format!(
        "Current position (FEN): {}\n\
         Game history: {}\n\
         Legal moves: {}\n\
         \n\
         Choose a legal move from the provided list.\n\
         Your move MUST match exactly one of the legal moves shown above.\n\
         Respond with a JSON containing your chosen move and reasoning.",
        request.position,
        history,
        request.legal_moves.join(", ")
    )
}

/// Remove markdown code fences (```json ... ```) around a payload.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = match trimmed.strip_prefix("```") {
        Some(rest) => rest.strip_prefix("json").unwrap_or(rest),
        None => trimmed,
    };
    let without_close = without_open.trim_end().strip_suffix("```").unwrap_or(without_open);
    without_close.trim().to_string()
}
