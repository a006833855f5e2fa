use crate::config::Config;
use crate::models::UNLIMITED_DAYS;

/// Fill `{name}`-style placeholders in a configured text.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

/// Money amounts are always shown with two decimals.
pub fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Main menu, one row.
pub fn start_menu(config: &Config) -> Vec<Vec<String>> {
    vec![vec![
        config.texts.start_button.clone(),
        config.texts.info_button.clone(),
    ]]
}

/// Plans side by side, with a way back home underneath.
pub fn plan_menu(config: &Config) -> Vec<Vec<String>> {
    vec![
        config.plans.keys().cloned().collect(),
        vec![config.texts.home_button.clone()],
    ]
}

/// Check and cancel buttons, with a way back home underneath. After one
/// unpaid check the check button is relabeled, the handler accepts either
/// label.
pub fn payment_menu(config: &Config, checked_before: bool) -> Vec<Vec<String>> {
    let check = if checked_before {
        config.texts.payment_checkagain.clone()
    } else {
        config.texts.payment_check.clone()
    };
    vec![
        vec![check, config.texts.payment_cancel.clone()],
        vec![config.texts.home_button.clone()],
    ]
}

pub fn home_menu(config: &Config) -> Vec<Vec<String>> {
    vec![vec![config.texts.home_button.clone()]]
}

/// The rendered plan list for the selection screen.
pub fn plan_list(config: &Config) -> String {
    let items = config
        .plans
        .iter()
        .map(|(name, plan)| {
            let days = if plan.days == UNLIMITED_DAYS {
                "∞".to_string()
            } else {
                plan.days.to_string()
            };
            render(
                &config.texts.select_plan_item,
                &[
                    ("name", name),
                    ("days", &days),
                    ("amount", &format_amount(plan.amount)),
                    ("description", &plan.description),
                ],
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    render(&config.texts.select_plan, &[("plans", &items)])
}
