//! `parley ask`: one-shot grounded answer.

use super::runtime;

pub async fn run(question: &str) -> Result<(), Box<dyn std::error::Error>> {
    let question = question.trim();
    if question.is_empty() {
        return Err("Question is required".into());
    }

    let runtime = runtime::load().await?;
    let answer = runtime.engine.answer(question).await;

    println!("{}", answer.text);
    println!();
    println!(
        "  source: {}   confidence: {}%",
        answer.source_id, answer.confidence
    );
    Ok(())
}
