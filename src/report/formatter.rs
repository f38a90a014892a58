//! Report text for Telegram (HTML parse mode).

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::types::ConsolidatedReport;

const RULE: &str = "------------------------------------------";

/// Render a report as an HTML message body.
///
/// Per-product lines are sorted by name; the cancelled section appears
/// only when something was cancelled.
pub fn format_report(report: &ConsolidatedReport) -> String {
    let mut out = String::from("<b>Статистика продаж за день OZON FBO:</b>\n\n");

    let _ = writeln!(out, "    <b>Количество заказов: {}</b>", report.total_quantity);
    out.push('\n');
    write_products(&mut out, &report.per_product_quantity);
    out.push('\n');

    if report.cancelled_quantity > 0 {
        let _ = writeln!(
            out,
            "    <b>Количество отмененных заказов: {}</b>",
            report.cancelled_quantity
        );
        out.push('\n');
        write_products(&mut out, &report.cancelled_per_product_quantity);
        out.push('\n');
    }

    out.push_str(RULE);
    out.push('\n');
    let _ = writeln!(out, "    <b>Итого количество: {}</b>", report.active_quantity());
    let _ = writeln!(out, "    <b>Итого сумма: {}</b>", money(report.gross_revenue));
    let _ = writeln!(
        out,
        "    <b>Итого сумма без комиссии OZON: {}</b>",
        money(report.net_of_commission)
    );
    let _ = writeln!(
        out,
        "    <b>Итого доход: {}</b>",
        money(report.net_of_commission_and_cost)
    );
    out
}

fn write_products(out: &mut String, products: &BTreeMap<String, u64>) {
    for (name, quantity) in products {
        let _ = writeln!(out, "        <i>{}: <b>{}</b></i>", escape_html(name), quantity);
    }
}

/// Two decimal places, half away from zero.
pub fn money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

/// Escape the characters Telegram's HTML mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
