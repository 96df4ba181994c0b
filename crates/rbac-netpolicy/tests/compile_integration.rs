//! Integration tests for the network ACL compilation core
//!
//! These drive a full [`CompileSession`] through its public operations with
//! fixed protocol and resolver tables, and check the graph and ledger that
//! the serializer receives.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rbac_netpolicy::{
    compile, AclMode, CompileSession, ConfigError, IpAclTemplate, PositionedDirective, ProtocolSet,
    StaticProtocolDb, StaticResolver, SystemProtocolDb, TypeSet,
};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const POLICY: &str = "/etc/grsec/policy";

fn resolver() -> StaticResolver {
    StaticResolver::new()
        .with_host(
            "mirror.example",
            [
                IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10)),
                IpAddr::V4(Ipv4Addr::new(203, 0, 113, 11)),
                IpAddr::V4(Ipv4Addr::new(203, 0, 113, 12)),
                IpAddr::V4(Ipv4Addr::new(203, 0, 113, 13)),
            ],
        )
        .with_host("admin.example", [IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))])
        .with_host("v6.example", [IpAddr::V6(Ipv6Addr::LOCALHOST)])
}

fn session() -> CompileSession {
    let protocols = StaticProtocolDb::new().with("icmp", 1).with("gre", 47);
    let mut session = CompileSession::new(Box::new(protocols), Box::new(resolver()));
    session.enter_file(POLICY);
    session
}

#[test]
fn test_family_alias_equivalence() {
    let mut session = session();
    let a = session.declare_subject("/bin/a");
    let b = session.declare_subject("/bin/b");
    session.add_sock_family(Some(a), "ipv4").unwrap();
    session.add_sock_family(Some(b), "inet").unwrap();

    let graph = session.graph();
    assert_eq!(
        graph.subject(a).unwrap().sock_families(),
        graph.subject(b).unwrap().sock_families()
    );
}

#[test]
fn test_wildcards_fill_every_word() {
    let mut session = session();
    let subject = session.declare_subject("/usr/bin/nc");
    session.add_sock_family(Some(subject), "all").unwrap();
    let families = session.graph().subject(subject).unwrap().sock_families();
    assert!(families.words().iter().all(|word| *word == u32::MAX));

    let mut template = IpAclTemplate::new();
    session.resolve_protocol_or_type(&mut template, "any_proto").unwrap();
    session.resolve_protocol_or_type(&mut template, "any_sock").unwrap();
    assert!(template.protocols.words().iter().all(|word| *word == u32::MAX));
    assert!(!template.types.contains(0));
    assert_eq!(template.types.count(), TypeSet::CAPACITY - 1);
}

#[test]
fn test_tcp_and_udp_carry_protocol_zero() {
    let session = session();
    for (token, number) in [("tcp", 6), ("udp", 17)] {
        let mut template = IpAclTemplate::new();
        session.resolve_protocol_or_type(&mut template, token).unwrap();
        assert_eq!(template.protocols.iter().collect::<Vec<_>>(), vec![0, number]);
        assert!(template.types.is_empty());
    }
}

#[test]
fn test_host_acl_cardinality_and_shared_fields() {
    let mut session = session();
    let subject = session.declare_subject("/usr/bin/rsync");
    let mut template = IpAclTemplate::new()
        .with_address(0, u32::MAX)
        .with_interface("eth1");
    session.resolve_protocol_or_type(&mut template, "stream").unwrap();
    session.resolve_protocol_or_type(&mut template, "tcp").unwrap();

    session
        .add_host_acl(Some(subject), AclMode::CONNECT, "mirror.example", &mut template)
        .unwrap();

    let acls = session.graph().subject(subject).unwrap().ip_acls();
    assert_eq!(acls.len(), 4);
    for (i, acl) in acls.iter().enumerate() {
        assert_eq!(acl.address().octets(), [203, 0, 113, 10 + i as u8]);
        assert_eq!(acl.mode, AclMode::CONNECT);
        assert_eq!(acl.netmask, u32::MAX);
        assert_eq!(acl.interface.as_deref(), Some("eth1"));
        assert_eq!(acl.protocols, template.protocols);
        assert_eq!(acl.types, template.types);
        assert_eq!((acl.port_low, acl.port_high), (0, u16::MAX));
    }
}

#[test]
fn test_role_host_cardinality() {
    let mut session = session();
    let role = session.declare_role("backup");
    session
        .add_role_allowed_host(role, "mirror.example", 0xffff_ff00)
        .unwrap();

    let role = session.graph().role(role).unwrap();
    assert_eq!(role.len(), 4);
    assert!(role.walk_from_tail().all(|(_, entry)| entry.netmask == 0xffff_ff00));
}

#[test]
fn test_ledger_accounting() {
    let mut session = session();
    let subjects = [
        session.declare_subject("/bin/one"),
        session.declare_subject("/bin/two"),
        session.declare_subject("/bin/three"),
    ];

    let plain = IpAclTemplate::new();
    let with_iface = IpAclTemplate::new().with_interface("lo");
    let mut entries = 0;
    let mut interfaces = 0;
    for (i, subject) in subjects.iter().enumerate() {
        for j in 0..=i {
            let template = if j % 2 == 0 { &plain } else { &with_iface };
            session.add_ip_acl(Some(*subject), AclMode::BIND, template).unwrap();
            entries += 1;
            interfaces += u64::from(template.interface.is_some());
        }
    }

    let role = session.declare_role("admin");
    session.add_role_allowed_ip(role, 0x0a00_0001, u32::MAX).unwrap();
    session.add_role_allowed_ip(role, 0x0a00_0002, u32::MAX).unwrap();

    let arrays = subjects.len() as u64;
    assert_eq!(session.ledger().count(), entries + arrays + interfaces + 2);
    assert_eq!(session.finish().allocations, entries + arrays + interfaces + 2);
}

#[test]
fn test_missing_subject_is_fatal_and_inert() {
    let mut session = session();
    session.set_line(17);
    let mut template = IpAclTemplate::new();

    let err = session
        .add_host_acl(None, AclMode::CONNECT, "mirror.example", &mut template)
        .unwrap_err();
    let config = err.as_config().unwrap();
    assert!(matches!(config, ConfigError::MissingSubject { .. }));
    assert_eq!(config.position().line, 17);

    assert_eq!(session.ledger().count(), 0);
    assert_eq!(template.address, 0);
}

#[test]
fn test_non_ipv4_host_rejected() {
    let mut session = session();
    let subject = session.declare_subject("/usr/bin/ping6");
    let role = session.declare_role("ops");
    let mut template = IpAclTemplate::new();

    let err = session
        .add_host_acl(Some(subject), AclMode::CONNECT, "v6.example", &mut template)
        .unwrap_err();
    assert!(matches!(err.as_config(), Some(ConfigError::NotIPv4 { host, .. }) if host == "v6.example"));

    let err = session
        .add_role_allowed_host(role, "v6.example", u32::MAX)
        .unwrap_err();
    assert!(matches!(err.as_config(), Some(ConfigError::NotIPv4 { .. })));

    assert_eq!(session.graph().ip_acl_count(), 0);
    assert_eq!(session.graph().allowed_ip_count(), 0);
}

#[test]
fn test_unresolvable_host() {
    let mut session = session();
    let role = session.declare_role("ops");
    let err = session
        .add_role_allowed_host(role, "nowhere.example", u32::MAX)
        .unwrap_err();
    assert!(matches!(err.as_config(), Some(ConfigError::UnresolvableHost { .. })));
}

#[test]
fn test_chain_linkage() {
    let mut session = session();
    let role = session.declare_role("admin");
    let e1 = session.add_role_allowed_ip(role, 1, u32::MAX).unwrap();
    let e2 = session.add_role_allowed_ip(role, 2, u32::MAX).unwrap();
    let e3 = session.add_role_allowed_ip(role, 3, u32::MAX).unwrap();

    let role = session.graph().role(role).unwrap();
    let backward: Vec<_> = role.walk_from_tail().map(|(id, _)| id).collect();
    assert_eq!(backward, vec![e3, e2, e1]);
    let forward: Vec<_> = role.walk_forward(e1).map(|(id, _)| id).collect();
    assert_eq!(forward, vec![e1, e2, e3]);
}

#[test]
fn test_system_protocol_db_fallback() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# protocols\nicmp 1 ICMP\nsctp 132 SCTP # stream control").unwrap();

    let db = SystemProtocolDb::load_or_empty(file.path()).unwrap();
    let mut session = CompileSession::new(Box::new(db), Box::new(resolver()));
    let mut template = IpAclTemplate::new();
    session.resolve_protocol_or_type(&mut template, "sctp").unwrap();
    session.resolve_protocol_or_type(&mut template, "SCTP").unwrap();
    assert_eq!(template.protocols.iter().collect::<Vec<_>>(), vec![132]);

    session.set_line(5);
    let err = session
        .resolve_protocol_or_type(&mut template, "quic")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid type/protocol: quic on line 5 of ."
    );
}

fn directives(json: &str) -> Vec<PositionedDirective> {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_compile_directive_stream() {
    let stream = directives(
        r#"[
        {"file": "/etc/grsec/policy", "line": 1, "op": "role", "name": "admin"},
        {"file": "/etc/grsec/policy", "line": 2, "op": "role_allowed_ip", "address": "192.168.1.0", "prefix_len": 24},
        {"file": "/etc/grsec/policy", "line": 3, "op": "role_allowed_host", "host": "admin.example"},
        {"file": "/etc/grsec/policy", "line": 4, "op": "subject", "name": "/usr/sbin/sshd"},
        {"file": "/etc/grsec/policy", "line": 5, "op": "sock_family", "family": "inet"},
        {"file": "/etc/grsec/policy", "line": 6, "op": "ip_acl", "mode": ["bind"],
         "address": "0.0.0.0", "prefix_len": 0, "ports": [22, 22], "protocols": ["stream", "tcp"]},
        {"file": "/etc/grsec/policy", "line": 7, "op": "host_acl", "mode": ["connect"],
         "host": "mirror.example", "interface": "eth0", "protocols": ["dgram", "udp"]}
    ]"#,
    );

    let compiled = compile(session(), stream).unwrap();
    let graph = &compiled.graph;
    assert_eq!(graph.roles().len(), 1);
    assert_eq!(graph.subjects().len(), 1);
    assert_eq!(graph.allowed_ip_count(), 2);
    assert_eq!(graph.ip_acl_count(), 5);

    let sshd = &graph.subjects()[0];
    assert_eq!(sshd.ip_acls()[0].netmask, 0);
    assert_eq!((sshd.ip_acls()[0].port_low, sshd.ip_acls()[0].port_high), (22, 22));
    assert_eq!(sshd.protocols_union().iter().collect::<Vec<_>>(), vec![0, 6, 17]);

    // 2 allowed IPs + 1 array + 5 entries + 4 interface names
    assert_eq!(compiled.allocations, 12);
}

#[test]
fn test_compile_stops_at_first_error() {
    let stream = directives(
        r#"[
        {"file": "/etc/grsec/policy", "line": 1, "op": "ip_acl", "mode": ["connect"], "address": "10.0.0.1"},
        {"file": "/etc/grsec/policy", "line": 2, "op": "sock_family", "family": "carrier-pigeon"}
    ]"#,
    );

    let err = compile(session(), stream).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error on line 1 of /etc/grsec/policy. Definition of an IP policy without a subject definition. \
         The RBAC system will not be allowed to be enabled until this problem is fixed."
    );
}

#[test]
fn test_compile_rejects_bad_literal() {
    let stream = directives(
        r#"[
        {"file": "/etc/grsec/policy", "line": 1, "op": "subject", "name": "/"},
        {"file": "/etc/grsec/policy", "line": 2, "op": "ip_acl", "mode": ["connect"], "address": "10.0.0.256"}
    ]"#,
    );

    let err = compile(session(), stream).unwrap_err();
    assert!(matches!(
        err.as_config(),
        Some(ConfigError::InvalidAddressLiteral { literal, .. }) if literal == "10.0.0.256"
    ));
}

fn protocol_words() -> impl Strategy<Value = [u32; 8]> {
    any::<[u32; 8]>()
}

proptest! {
    #[test]
    fn prop_union_invariant(entries in proptest::collection::vec((protocol_words(), any::<u32>()), 1..24)) {
        let mut session = session();
        let subject = session.declare_subject("/usr/bin/anything");

        for (protocols, types) in &entries {
            let mut template = IpAclTemplate::new();
            template.protocols = ProtocolSet::from_words(*protocols);
            template.types = TypeSet::from_words([*types]);
            session.add_ip_acl(Some(subject), AclMode::CONNECT, &template).unwrap();

            let subject = session.graph().subject(subject).unwrap();
            let mut expected_protocols = ProtocolSet::new();
            let mut expected_types = TypeSet::new();
            for acl in subject.ip_acls() {
                expected_protocols.union_with(&acl.protocols);
                expected_types.union_with(&acl.types);
            }
            prop_assert_eq!(subject.protocols_union(), &expected_protocols);
            prop_assert_eq!(subject.types_union(), &expected_types);
        }

        prop_assert_eq!(session.ledger().count(), entries.len() as u64 + 1);
    }
}
