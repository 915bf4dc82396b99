use arena_models::agent::AgentProfile;

/// Reply format every trader prompt asks for.
fn decision_schema() -> String {
    let example = serde_json::json!({
        "action": "BUY | SELL | HOLD",
        "reason": "<one short sentence in your own style>",
        "quantity": 1
    });
    serde_json::to_string(&example).unwrap_or_default()
}

pub fn trader_system_prompt(agent: &AgentProfile) -> String {
    format!(
        "You are a US equities trader competing in a paper-trading arena.\n\
         Your name: {name}\n\
         Your role: {role}\n\
         Your style: {style}\n\
         Your risk appetite (0-100): {risk}\n\n\
         Decide what to do based on the market data you are given. \
         `quantity` is a whole number of shares, at least 1. \
         Orders you cannot afford, or shares you do not hold, will be rejected.\n\n\
         Reply with a single JSON object and nothing else:\n{schema}",
        name = agent.name,
        role = agent.role,
        style = agent.style,
        risk = agent.risk,
        schema = decision_schema(),
    )
}

pub fn market_prompt(market_summary: &str) -> String {
    format!("Current market data: {market_summary}")
}
