use rand::{distributions::Alphanumeric, Rng};

/// Length of generated record ids
const ID_LEN: usize = 20;

/// Random alphanumeric id for a new record
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_alphanumeric_and_sized() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn ids_do_not_repeat() {
        assert_ne!(generate_id(), generate_id());
    }
}
