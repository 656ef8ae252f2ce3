//! Target-vendor migration transform.
//!
//! Takes canonical objects and policies selected for migration and produces
//! target-platform creation requests: names constrained to the target's
//! identifier rules, address/URL values translated to its grammar, groups
//! re-expressed as flat member-name lists, and ICMP-bearing policies split
//! into a ping-application sibling.

use std::collections::BTreeMap;

use canon_store::{
    CanonicalObject, NatPolicy, ObjectKind, ObjectRef, ObjectValue, PolicyAction, SecurityPolicy,
    Store,
};
use serde::Serialize;

pub mod groups;
pub mod icmp_split;
pub mod names;
pub mod values;

pub use groups::{contains_icmp, empty_after_icmp_strip, transitive_concrete_members};
pub use icmp_split::{split_icmp, SplitPolicies, PING_APPLICATION, PING_SUFFIX};
pub use names::{
    constrain_object_name, constrain_url_category_name, MAX_OBJECT_NAME, MAX_URL_CATEGORY_NAME,
};
pub use values::{address_type, rewrite_url_wildcard};

use crate::literal::FULL_PORT_RANGE;

/// Address object creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressCreate {
    pub name: String,
    pub addr_type: String,
    pub value: String,
    pub description: String,
}

/// Service object creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCreate {
    pub name: String,
    pub protocol: String,
    pub port: String,
    pub description: String,
}

/// Address group creation request: a flat member-name list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressGroupCreate {
    pub name: String,
    pub members: Vec<String>,
    pub description: String,
}

/// Service group creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceGroupCreate {
    pub name: String,
    pub members: Vec<String>,
}

/// URL category creation request. The target has no URL group concept, so
/// group members are hoisted into the category's value list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlCategoryCreate {
    pub name: String,
    pub urls: Vec<String>,
    pub description: String,
}

/// Security rule creation request. Every list uses `["any"]` for an
/// unrestricted flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleCreate {
    pub name: String,
    pub action: String,
    pub disabled: bool,
    pub from_zones: Vec<String>,
    pub to_zones: Vec<String>,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub services: Vec<String>,
    pub applications: Vec<String>,
    pub users: Vec<String>,
    pub url_categories: Vec<String>,
    pub schedule: Option<String>,
    pub log_start: bool,
    pub log_end: bool,
}

/// NAT rule creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatRuleCreate {
    pub name: String,
    pub disabled: bool,
    pub from_zone: Option<String>,
    pub to_zone: Option<String>,
    pub original_source: Option<String>,
    pub translated_source: Option<String>,
    pub original_destination: Option<String>,
    pub translated_destination: Option<String>,
    pub service: Option<String>,
}

fn action_name(action: PolicyAction) -> &'static str {
    match action {
        // Trust and Monitor have no target counterpart; both pass traffic.
        PolicyAction::Allow | PolicyAction::Trust | PolicyAction::Monitor => "allow",
        PolicyAction::Block => "deny",
    }
}

fn any_or(names: Vec<String>) -> Vec<String> {
    if names.is_empty() {
        vec!["any".to_string()]
    } else {
        names
    }
}

/// Stateless mapper from canonical records to target creation requests.
///
/// Constructed once per migration run with the run's zone mapping.
pub struct Transformer<'a> {
    store: &'a Store,
    zone_map: &'a BTreeMap<String, String>,
}

impl<'a> Transformer<'a> {
    pub fn new(store: &'a Store, zone_map: &'a BTreeMap<String, String>) -> Self {
        Transformer { store, zone_map }
    }

    /// Target name of a canonical object, constraint applied.
    pub fn target_name(&self, object: &CanonicalObject) -> String {
        constrain_object_name(&object.name, &object.uid)
    }

    fn ref_name(&self, reference: &ObjectRef) -> String {
        constrain_object_name(&reference.name, &reference.uid)
    }

    /// Map a source zone name through the run's zone mapping.
    pub fn zone_name(&self, name: &str) -> String {
        self.zone_map
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Address creation request for a network object.
    pub fn address_create(&self, object: &CanonicalObject) -> Option<AddressCreate> {
        let ObjectValue::Network { value, net_type } = &object.value else {
            return None;
        };
        Some(AddressCreate {
            name: self.target_name(object),
            addr_type: address_type(*net_type).to_string(),
            value: value.clone(),
            description: object.description.clone(),
        })
    }

    /// Service creation request for a port object.
    pub fn service_create(&self, object: &CanonicalObject) -> Option<ServiceCreate> {
        let ObjectValue::Port { protocol, number } = &object.value else {
            return None;
        };
        Some(ServiceCreate {
            name: self.target_name(object),
            protocol: protocol.clone(),
            port: number.clone().unwrap_or_else(|| FULL_PORT_RANGE.to_string()),
            description: object.description.clone(),
        })
    }

    /// URL category holding a single URL object's value.
    pub fn url_category_for_object(&self, object: &CanonicalObject) -> Option<UrlCategoryCreate> {
        let ObjectValue::Url { value } = &object.value else {
            return None;
        };
        Some(UrlCategoryCreate {
            name: constrain_url_category_name(&object.name, &object.uid),
            urls: vec![rewrite_url_wildcard(value)],
            description: object.description.clone(),
        })
    }

    /// URL category for a URL group: every transitively reachable member
    /// URL hoisted into the category's value list.
    pub fn url_category_for_group(&self, group: &CanonicalObject) -> UrlCategoryCreate {
        let urls = transitive_concrete_members(self.store, &group.uid)
            .iter()
            .filter_map(|member| match &member.value {
                ObjectValue::Url { value } => Some(rewrite_url_wildcard(value)),
                _ => None,
            })
            .collect();
        UrlCategoryCreate {
            name: constrain_url_category_name(&group.name, &group.uid),
            urls,
            description: group.description.clone(),
        }
    }

    /// Address group as a flat list of direct member and subgroup names.
    pub fn address_group_create(&self, group: &CanonicalObject) -> AddressGroupCreate {
        AddressGroupCreate {
            name: self.target_name(group),
            members: self.direct_member_names(group, false),
            description: group.description.clone(),
        }
    }

    /// Service group with ICMP members stripped.
    ///
    /// Returns `None` when the strip leaves no members: the group is not
    /// created and policy references to it fall back to "any".
    pub fn service_group_create(&self, group: &CanonicalObject) -> Option<ServiceGroupCreate> {
        let members = self.direct_member_names(group, true);
        if members.is_empty() {
            return None;
        }
        Some(ServiceGroupCreate {
            name: self.target_name(group),
            members,
        })
    }

    fn direct_member_names(&self, group: &CanonicalObject, strip_icmp: bool) -> Vec<String> {
        let mut members: Vec<String> = self
            .store
            .object_members(&group.uid)
            .into_iter()
            .filter(|m| !(strip_icmp && m.kind == ObjectKind::Icmp))
            .map(|m| self.target_name(m))
            .collect();
        for subgroup in self.store.group_members(&group.uid) {
            if strip_icmp && empty_after_icmp_strip(self.store, &subgroup.uid) {
                continue;
            }
            members.push(self.target_name(subgroup));
        }
        members
    }

    /// Security rule creation request for one (already split) policy.
    pub fn rule_create(&self, policy: &SecurityPolicy) -> RuleCreate {
        RuleCreate {
            name: constrain_object_name(&policy.name, &policy.uid),
            action: action_name(policy.action).to_string(),
            disabled: !policy.enabled,
            from_zones: any_or(
                policy
                    .src_zones
                    .iter()
                    .map(|z| self.zone_name(&z.name))
                    .collect(),
            ),
            to_zones: any_or(
                policy
                    .dst_zones
                    .iter()
                    .map(|z| self.zone_name(&z.name))
                    .collect(),
            ),
            sources: any_or(policy.src_networks.iter().map(|r| self.ref_name(r)).collect()),
            destinations: any_or(
                policy.dst_networks.iter().map(|r| self.ref_name(r)).collect(),
            ),
            services: any_or(policy.dst_ports.iter().map(|r| self.ref_name(r)).collect()),
            applications: any_or(
                policy
                    .applications
                    .iter()
                    .map(|a| a.name.clone())
                    .collect(),
            ),
            users: any_or(policy.users.iter().map(|u| u.name.clone()).collect()),
            url_categories: any_or(
                policy
                    .urls
                    .iter()
                    .map(|u| constrain_url_category_name(&u.name, &u.uid))
                    .collect(),
            ),
            schedule: policy.schedule.as_ref().map(|s| self.ref_name(s)),
            log_start: policy.log_begin,
            log_end: policy.log_end,
        }
    }

    /// NAT rule creation request.
    pub fn nat_rule_create(&self, policy: &NatPolicy) -> NatRuleCreate {
        NatRuleCreate {
            name: constrain_object_name(&policy.name, &policy.uid),
            disabled: !policy.enabled,
            from_zone: policy.src_zone.as_ref().map(|z| self.zone_name(&z.name)),
            to_zone: policy.dst_zone.as_ref().map(|z| self.zone_name(&z.name)),
            original_source: policy.original_source.as_ref().map(|r| self.ref_name(r)),
            translated_source: policy.translated_source.as_ref().map(|r| self.ref_name(r)),
            original_destination: policy
                .original_destination
                .as_ref()
                .map(|r| self.ref_name(r)),
            translated_destination: policy
                .translated_destination
                .as_ref()
                .map(|r| self.ref_name(r)),
            service: policy.service.as_ref().map(|r| self.ref_name(r)),
        }
    }
}

#[cfg(test)]
mod tests {
    use canon_store::{Container, ContainerKind, NetworkType, Uid};
    use pretty_assertions::assert_eq;

    use super::*;

    fn seed() -> Store {
        let mut store = Store::new();
        store
            .insert_container(Container::new("oc", "objects", ContainerKind::Object, "dev"))
            .unwrap();
        store
    }

    fn object(uid: &str, name: &str, kind: ObjectKind, value: ObjectValue) -> CanonicalObject {
        CanonicalObject {
            uid: uid.into(),
            name: name.to_string(),
            kind,
            container_uid: "oc".into(),
            description: "test object".to_string(),
            overridable: false,
            value,
        }
    }

    #[test]
    fn network_objects_become_addresses() {
        let store = seed();
        let zone_map = BTreeMap::new();
        let tx = Transformer::new(&store, &zone_map);

        let host = object(
            "o-1",
            "web server",
            ObjectKind::Network,
            ObjectValue::Network {
                value: "10.1.1.1/32".to_string(),
                net_type: NetworkType::Host,
            },
        );
        let create = tx.address_create(&host).unwrap();
        assert_eq!(create.name, "web server");
        assert_eq!(create.addr_type, "ip-netmask");
        assert_eq!(create.value, "10.1.1.1/32");

        let range = object(
            "o-2",
            "dhcp-pool",
            ObjectKind::Network,
            ObjectValue::Network {
                value: "10.1.2.10-10.1.2.200".to_string(),
                net_type: NetworkType::Range,
            },
        );
        assert_eq!(tx.address_create(&range).unwrap().addr_type, "ip-range");
    }

    #[test]
    fn port_objects_become_services_with_default_range() {
        let store = seed();
        let zone_map = BTreeMap::new();
        let tx = Transformer::new(&store, &zone_map);

        let bare = object(
            "o-3",
            "all-tcp",
            ObjectKind::Port,
            ObjectValue::Port {
                protocol: "tcp".to_string(),
                number: None,
            },
        );
        let create = tx.service_create(&bare).unwrap();
        assert_eq!(create.port, "1-65535");
        assert_eq!(create.protocol, "tcp");
    }

    #[test]
    fn url_group_members_are_hoisted_into_the_category() {
        let mut store = seed();
        store
            .insert_object(object(
                "g-url",
                "blocked-sites",
                ObjectKind::UrlGroup,
                ObjectValue::Plain,
            ))
            .unwrap();
        store
            .insert_object(object(
                "u-1",
                "badsite",
                ObjectKind::Url,
                ObjectValue::Url {
                    value: ".*bad.example".to_string(),
                },
            ))
            .unwrap();
        store
            .insert_object_member(&"g-url".into(), &"u-1".into())
            .unwrap();
        let zone_map = BTreeMap::new();
        let tx = Transformer::new(&store, &zone_map);

        let group = store.object(&"g-url".into()).unwrap();
        let category = tx.url_category_for_group(group);
        assert_eq!(category.name, "blocked-sites");
        assert_eq!(category.urls, vec!["*.bad.example"]);
    }

    #[test]
    fn rules_map_zones_and_default_empty_sets_to_any() {
        let store = seed();
        let zone_map: BTreeMap<String, String> =
            [("inside".to_string(), "trust".to_string())].into_iter().collect();
        let tx = Transformer::new(&store, &zone_map);

        let policy = SecurityPolicy {
            uid: Uid::new("p-1"),
            name: "allow web".to_string(),
            container_uid: "oc".into(),
            position: 1,
            enabled: true,
            action: PolicyAction::Block,
            section: None,
            log_begin: true,
            log_end: false,
            src_zones: vec![ObjectRef::new("z-1", "inside", ObjectKind::Zone)],
            dst_zones: vec![ObjectRef::new("z-2", "outside", ObjectKind::Zone)],
            src_networks: vec![],
            dst_networks: vec![],
            src_ports: vec![],
            dst_ports: vec![],
            users: vec![],
            urls: vec![],
            applications: vec![],
            schedule: None,
        };
        let rule = tx.rule_create(&policy);
        assert_eq!(rule.action, "deny");
        assert_eq!(rule.from_zones, vec!["trust"]);
        assert_eq!(rule.to_zones, vec!["outside"]);
        assert_eq!(rule.sources, vec!["any"]);
        assert_eq!(rule.services, vec!["any"]);
        assert!(rule.log_start);
        assert!(!rule.disabled);
    }

    #[test]
    fn service_group_with_only_icmp_members_is_not_created() {
        let mut store = seed();
        store
            .insert_object(object(
                "g-1",
                "ping-grp",
                ObjectKind::PortGroup,
                ObjectValue::Plain,
            ))
            .unwrap();
        store
            .insert_object(object(
                "i-1",
                "echo",
                ObjectKind::Icmp,
                ObjectValue::Icmp {
                    icmp_type: Some(8),
                    code: None,
                },
            ))
            .unwrap();
        store
            .insert_object_member(&"g-1".into(), &"i-1".into())
            .unwrap();
        let zone_map = BTreeMap::new();
        let tx = Transformer::new(&store, &zone_map);
        let group = store.object(&"g-1".into()).unwrap();
        assert!(tx.service_group_create(group).is_none());
    }
}
