//! Rule selection (SPEC_FULL.md §4.6): priority + hit-count tie-breaking
//! over the rules that survived condition evaluation.

use super::model::Rule;

/// Marks `use_flag` on the winning rule (if any) and returns its index.
///
/// 1. Every valid rule tied on the maximum `hits` is marked.
/// 2. If more than one is marked, any whose `priority` is below the maximum
///    priority among valid rules is unmarked.
/// 3. If more than one is still marked and more than one of those carries a
///    `route` action, only the last (highest-index) such rule survives —
///    the source logs this as a warning rather than rejecting the rule set
///    (SPEC_FULL.md §9, "Open question — resolved"); this port preserves
///    that runtime behaviour and keeps the warning.
/// 4. If ties remain even after that (no `route` action breaks them),
///    the highest-index rule wins — not specified upstream, but required to
///    honor "selects at most one rule" (SPEC_FULL.md §8).
pub fn select_rule(rules: &mut [Rule]) -> Option<usize> {
    let valid: Vec<usize> = (0..rules.len()).filter(|&i| rules[i].valid).collect();
    if valid.is_empty() {
        return None;
    }

    let maxhits = valid.iter().map(|&i| rules[i].hits).max().unwrap();
    let maxprio = valid.iter().map(|&i| rules[i].priority).max().unwrap();

    for &i in &valid {
        rules[i].use_flag = rules[i].hits == maxhits;
    }

    let mut marked: Vec<usize> = valid.iter().copied().filter(|&i| rules[i].use_flag).collect();

    if marked.len() > 1 {
        for &i in &marked {
            if rules[i].priority < maxprio {
                rules[i].use_flag = false;
            }
        }
        marked.retain(|&i| rules[i].use_flag);
    }

    if marked.len() > 1 {
        let route_bearing: Vec<usize> = marked
            .iter()
            .copied()
            .filter(|&i| rules[i].actions.route.is_some())
            .collect();
        if route_bearing.len() > 1 {
            tracing::warn!(
                count = route_bearing.len(),
                "multiple tied rules carry a route action; keeping the last by index"
            );
            let last = *route_bearing.last().unwrap();
            for &i in &marked {
                rules[i].use_flag = i == last;
            }
            marked = vec![last];
        }
    }

    if marked.len() > 1 {
        let last = *marked.last().unwrap();
        for &i in &marked {
            rules[i].use_flag = i == last;
        }
        marked = vec![last];
    }

    marked.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{Actions, Conditions};

    fn rule(id: &str, priority: i64, hits: u32, route: Option<&str>) -> Rule {
        Rule {
            id: id.into(),
            name: None,
            priority,
            transport: None,
            conditions: Conditions::default(),
            actions: Actions {
                add: vec![],
                route: route.map(str::to_string),
            },
            default_route: None,
            default_headers: vec![],
            valid: true,
            hits,
            use_flag: false,
        }
    }

    #[test]
    fn higher_priority_wins_on_hit_tie() {
        let mut rules = vec![rule("r1", 1, 1, None), rule("r2", 5, 1, None)];
        let selected = select_rule(&mut rules).unwrap();
        assert_eq!(selected, 1);
    }

    #[test]
    fn invalid_rules_are_never_selected() {
        let mut rules = vec![rule("r1", 10, 5, None)];
        rules[0].valid = false;
        assert_eq!(select_rule(&mut rules), None);
    }

    #[test]
    fn higher_hits_wins_over_lower_hits_regardless_of_priority() {
        let mut rules = vec![rule("r1", 10, 1, None), rule("r2", 1, 2, None)];
        let selected = select_rule(&mut rules).unwrap();
        assert_eq!(selected, 1);
    }

    #[test]
    fn tie_with_multiple_routes_keeps_last_by_index() {
        let mut rules = vec![
            rule("r1", 5, 1, Some("sip:a@h")),
            rule("r2", 5, 1, Some("sip:b@h")),
        ];
        let selected = select_rule(&mut rules).unwrap();
        assert_eq!(selected, 1);
    }

    #[test]
    fn selection_never_returns_more_than_one_index() {
        let mut rules = vec![rule("r1", 5, 1, None), rule("r2", 5, 1, None), rule("r3", 5, 1, None)];
        let selected = select_rule(&mut rules);
        assert_eq!(selected, Some(2));
    }
}
