//! Reserved fixed IP port sharing and allowed address pairs

use crate::client::GcoreClient;
use async_trait::async_trait;
use nicflow_core::{AllowedAddressPair, ApiResult, ReservedFixedIpApi};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PortIdsRequest<'a> {
    port_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct AllowedAddressPairsRequest<'a> {
    allowed_address_pairs: &'a [AllowedAddressPair],
}

impl GcoreClient {
    async fn connected_devices(
        &self,
        method: reqwest::Method,
        vip_port_id: &str,
        port_ids: &[String],
    ) -> ApiResult<()> {
        let url = self.resource_url(
            "reserved_fixed_ips",
            &format!("{}/connected_devices", vip_port_id),
        );
        let _: serde_json::Value = self
            .send(method, &url, &PortIdsRequest { port_ids })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReservedFixedIpApi for GcoreClient {
    async fn add_instance_ports(&self, vip_port_id: &str, port_ids: &[String]) -> ApiResult<()> {
        self.connected_devices(reqwest::Method::PATCH, vip_port_id, port_ids)
            .await
    }

    async fn replace_instance_ports(
        &self,
        vip_port_id: &str,
        port_ids: &[String],
    ) -> ApiResult<()> {
        self.connected_devices(reqwest::Method::PUT, vip_port_id, port_ids)
            .await
    }

    async fn assign_allowed_address_pairs(
        &self,
        port_id: &str,
        pairs: &[AllowedAddressPair],
    ) -> ApiResult<()> {
        let url = self.resource_url("ports", &format!("{}/allow_address_pairs", port_id));
        let body = AllowedAddressPairsRequest {
            allowed_address_pairs: pairs,
        };
        let _: serde_json::Value = self.send(reqwest::Method::PUT, &url, &body).await?;
        Ok(())
    }
}
