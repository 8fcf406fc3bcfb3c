//! Web enumeration operations

use super::ReconService;
use crate::params::{FfufParams, GobusterParams, WhatWebParams};
use crate::result::ToolResult;
use crate::tools::ToolRequest;

impl ReconService {
    /// Web technology fingerprint with WhatWeb
    pub async fn whatweb_scan(&self, params: WhatWebParams) -> ToolResult {
        self.run_tool(ToolRequest::WhatWeb(params)).await
    }

    /// Directory brute force with gobuster
    pub async fn gobuster_dir(&self, params: GobusterParams) -> ToolResult {
        self.run_tool(ToolRequest::Gobuster(params)).await
    }

    /// `FUZZ` substitution with ffuf
    pub async fn ffuf_fuzz(&self, params: FfufParams) -> ToolResult {
        self.run_tool(ToolRequest::Ffuf(params)).await
    }
}
