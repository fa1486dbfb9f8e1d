use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn sanitized_env_names_never_contain_a_slash(name in "[a-zA-Z0-9/_.-]{1,40}") {
        let sanitized = gitfs::refs::sanitize(&name);
        prop_assert!(!sanitized.contains('/'));
    }

    #[test]
    fn remote_hash_is_deterministic_and_hex(uri in "https://[a-z]{3,10}\\.example/[a-z]{1,10}\\.git") {
        let a = gitfs::remote::hash_uri(&uri);
        let b = gitfs::remote::hash_uri(&uri);
        prop_assert_eq!(a.clone(), b);
        prop_assert_eq!(a.len(), 32);
        prop_assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn whitelist_blacklist_never_exposes_a_blacklisted_name(name in "[a-z]{1,12}") {
        let blacklist = vec![name.clone()];
        prop_assert!(!gitfs::refs::check_whitelist_blacklist(&name, &[], &blacklist));
    }
}
