use crate::quote::QuoteDetails;

/// Styling selected by the sign of the change amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Anything carrying a minus sign is down, including `-0.0`. Zero is up.
    pub fn of(change: f64) -> Self {
        if change.is_sign_negative() {
            Direction::Down
        } else {
            Direction::Up
        }
    }

    pub fn trend(self) -> &'static str {
        match self {
            Direction::Up => ":chart_with_upwards_trend:",
            Direction::Down => ":chart_with_downwards_trend:",
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Direction::Up => ":large_green_circle:",
            Direction::Down => ":red_circle:",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Direction::Up => "#00FF00",
            Direction::Down => "#FF0000",
        }
    }
}

/// A quote notification ready to be posted to a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub direction: Direction,
    pub color: String,
    /// Plain text, emoji markers allowed.
    pub header: String,
    /// Markdown line with the current price.
    pub body: String,
    pub previous_close: String,
    pub change: String,
}

/// `$12.30`, or `-$1.23` for negative amounts. Sub-dollar amounts keep up
/// to six decimals so penny-stock prices don't collapse to `$0.00`.
pub fn money(amount: f64) -> String {
    let sign = if amount.is_sign_negative() { "-" } else { "" };
    format!("{}${}", sign, decimal(amount.abs()))
}

fn decimal(magnitude: f64) -> String {
    if magnitude >= 1.0 {
        return format!("{:.2}", magnitude);
    }
    let fixed = format!("{:.6}", magnitude);
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    format!("{}.{:0<2}", whole, frac.trim_end_matches('0'))
}

pub fn render(details: &QuoteDetails) -> RenderedMessage {
    let direction = Direction::of(details.change_amount);

    RenderedMessage {
        direction,
        color: direction.color().to_string(),
        header: format!(
            "{} ({})  {}",
            details.name,
            details.symbol,
            direction.indicator()
        ),
        body: format!("*Current Price:* {}", money(details.current_price)),
        previous_close: money(details.previous_close),
        change: format!(
            "{} ({:.2}%) {}",
            money(details.change_amount),
            details.change_percent,
            direction.trend()
        ),
    }
}
