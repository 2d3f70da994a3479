//! §4.4.5: Cartesian expansion of a `Response` into ordered `Combination`s.

use itertools::Itertools;

use super::{Match, Response};

/// One element of a combination: the candidate matches for a single member
/// of the chosen credential-set option.
#[derive(Debug, Clone)]
pub struct CombinationElement {
    pub matches: Vec<Match>,
}

/// One concrete pick across all credential-sets, handed to the Picker as a
/// selectable unit.
#[derive(Debug, Clone)]
pub struct Combination {
    pub combination_number: usize,
    pub elements: Vec<CombinationElement>,
}

/// Enumerate every combination in odometer order (the last credential-set's
/// choice varies fastest). For an optional credential-set, the choice index
/// equal to `options.len()` is the sentinel meaning "omit this set".
pub fn explode(response: &Response) -> Vec<Combination> {
    let choice_ranges: Vec<Vec<usize>> = response
        .credential_sets
        .iter()
        .map(|set| {
            let omit = if set.optional { 1 } else { 0 };
            (0..set.options.len() + omit).collect()
        })
        .collect();

    choice_ranges
        .into_iter()
        .multi_cartesian_product()
        .enumerate()
        .map(|(combination_number, choice)| Combination {
            combination_number,
            elements: build_elements(response, &choice),
        })
        .collect()
}

fn build_elements(response: &Response, choice: &[usize]) -> Vec<CombinationElement> {
    choice
        .iter()
        .enumerate()
        .filter_map(|(set_index, &option_index)| {
            let set = &response.credential_sets[set_index];
            if option_index == set.options.len() {
                return None;
            }
            Some(set.options[option_index].members.iter().map(|member| CombinationElement {
                matches: member.matches.clone(),
            }))
        })
        .flatten()
        .collect()
}
