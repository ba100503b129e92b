use super::CronField;
use crate::domain::SelectOption;

/// Builds the `(value, label)` choices a form renders for one cron field.
///
/// # Arguments
///
/// * `field` - The cron field the options are for.
/// * `wildcard` - Prepend a `("*", "*")` option.
/// * `numeric_labels_only` - Label months and weekdays with their numbers
///   instead of their names.
pub fn options_for(field: CronField, wildcard: bool, numeric_labels_only: bool) -> Vec<SelectOption> {
    let mut options = Vec::with_capacity(field.range().count() + usize::from(wildcard));

    if wildcard {
        options.push(SelectOption::new("*", "*"));
    }

    let labels = field.labels().filter(|_| !numeric_labels_only);

    for (index, value) in field.range().enumerate() {
        let label = labels
            .and_then(|labels| labels.get(index))
            .map(|label| label.to_string())
            .unwrap_or_else(|| value.to_string());

        options.push(SelectOption::new(value.to_string(), label));
    }

    options
}
