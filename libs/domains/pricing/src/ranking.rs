use crate::models::MethodOption;
use crate::naming::normalize_base_name;

/// Order candidates for display.
///
/// Candidates sharing a base name stay adjacent, ordered by their first
/// starting level; groups are ordered by their lowest starting level. All
/// sorts are stable, so equal keys keep generation order and the output is
/// identical for identical input.
pub fn rank(options: Vec<MethodOption>) -> Vec<MethodOption> {
    let mut groups = options.into_iter().fold(
        Vec::<(String, Vec<MethodOption>)>::new(),
        |mut groups, option| {
            let base = normalize_base_name(&option.method_name);
            match groups.iter_mut().find(|(existing, _)| *existing == base) {
                Some((_, members)) => members.push(option),
                None => groups.push((base, vec![option])),
            }
            groups
        },
    );

    for (_, members) in &mut groups {
        members.sort_by_key(MethodOption::first_start);
    }
    groups.sort_by_key(|(_, members)| members.iter().map(MethodOption::first_start).min());

    groups
        .into_iter()
        .flat_map(|(_, members)| members)
        .collect()
}
