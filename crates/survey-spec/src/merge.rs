use crate::responses::ResponseElement;

/// Merges the trials of a resumed run into the previously stored ones.
///
/// Fresh trials always replace the overlapping prefix. When the new run is
/// shorter than the stored one, the stored trailing trials are kept so that
/// pages answered earlier but not yet revisited are not lost. The output
/// length is `max(prior.len(), incoming.len())`.
pub fn merge_responses(
    prior: &[ResponseElement],
    incoming: &[ResponseElement],
) -> Vec<ResponseElement> {
    let mut merged = incoming.to_vec();
    if prior.len() > incoming.len() {
        merged.extend_from_slice(&prior[incoming.len()..]);
    }
    merged
}
