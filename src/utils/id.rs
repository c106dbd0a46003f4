/// Process-unique random candidate identity.
pub fn random_candidate_id() -> String {
    nanoid::nanoid!()
}
