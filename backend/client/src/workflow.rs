//! State of one disclosure drafting session, step by step.
//!
//! Each AI-backed panel is driven in two halves: `start_*` validates input,
//! marks the panel busy and returns the live [`StreamHandle`]; `complete_*`
//! takes the finished session and applies it. The `generate_*` methods do
//! both for callers that only want the result. A caller that gives up on a
//! handle without completing it calls [`DisclosureWorkflow::abort`] to free
//! the panel.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use patentflow_core::{OptimizationType, BENEFICIAL_EFFECTS_HEADER, PROTECTION_POINTS_HEADER};

use crate::consumer::{StreamHandle, StreamRequest, StreamingClient};
use crate::error::ConsumerError;
use crate::history::{History, HistoryEntry};
use crate::session::{StreamSession, StreamState};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("{0:?} already has a request in flight")]
    Busy(Panel),

    #[error("no content block with id {0}")]
    UnknownBlock(Uuid),

    #[error("request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Consumer(#[from] ConsumerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    BasicInfo = 1,
    TechBackground = 2,
    TechSolution = 3,
    Benefits = 4,
    Document = 5,
}

impl Step {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Self {
        match self {
            Self::BasicInfo => Self::TechBackground,
            Self::TechBackground => Self::TechSolution,
            Self::TechSolution => Self::Benefits,
            Self::Benefits | Self::Document => Self::Document,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::BasicInfo | Self::TechBackground => Self::BasicInfo,
            Self::TechSolution => Self::TechBackground,
            Self::Benefits => Self::TechSolution,
            Self::Document => Self::Benefits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationType {
    #[serde(rename = "发明")]
    Invention,
    #[serde(rename = "实用新型")]
    UtilityModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

/// A piece of the technical solution. Image blocks hold only the file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: Uuid,
    pub kind: BlockKind,
    pub content: String,
}

impl ContentBlock {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordDefinition {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// A part of the form that can run one request at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Background,
    Block(Uuid),
    Effects,
}

/// Terms merged into the keyword list after a full rewrite.
pub const SUGGESTED_KEYWORDS: [(&str, &str); 3] = [
    ("技术方案", "指为解决特定技术问题而采用的技术手段的集合"),
    ("实施例", "指发明创造的具体实现方式"),
    ("权利要求", "指专利申请人请求专利保护的技术范围"),
];

/// Solutions shorter than this many characters are flagged as brief.
pub const MIN_SOLUTION_CHARS: usize = 100;

const VAGUE_TERMS: [&str; 2] = ["等", "之类"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiWarningKind {
    Brief,
    Image,
    Unclear,
}

/// A problem found in the technical solution during a full rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiWarning {
    pub kind: AiWarningKind,
    pub message: String,
}

impl AiWarning {
    fn new(kind: AiWarningKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

/// Checks `text` (the joined text blocks) and the image blocks for gaps.
pub fn detect_warnings(text: &str, blocks: &[ContentBlock]) -> Vec<AiWarning> {
    let mut warnings = Vec::new();
    if text.chars().count() < MIN_SOLUTION_CHARS {
        warnings.push(AiWarning::new(
            AiWarningKind::Brief,
            "技术方案描述过于简略，建议补充更多技术细节",
        ));
    }
    if blocks
        .iter()
        .any(|block| block.kind == BlockKind::Image && block.content.trim().is_empty())
    {
        warnings.push(AiWarning::new(
            AiWarningKind::Image,
            "存在未上传图片的图片区块，请检查",
        ));
    }
    if VAGUE_TERMS.iter().any(|term| text.contains(term)) {
        warnings.push(AiWarning::new(
            AiWarningKind::Unclear,
            "文中存在模糊表述（如'等'、'之类'），建议明确具体内容",
        ));
    }
    warnings
}

/// Split the technical-effects stream into beneficial effects and protection points.
pub fn split_effects(text: &str) -> (String, String) {
    let body = text.strip_prefix(BENEFICIAL_EFFECTS_HEADER).unwrap_or(text);
    let protection_heading = PROTECTION_POINTS_HEADER.trim();
    match body.split_once(protection_heading) {
        Some((effects, points)) => (effects.trim().to_string(), points.trim().to_string()),
        None => (body.trim().to_string(), String::new()),
    }
}

#[derive(Debug)]
pub struct DisclosureWorkflow {
    pub step: Step,
    pub invention_name: String,
    pub contact_person: String,
    pub application_type: Option<ApplicationType>,
    pub technical_field: String,
    pub existing_problems: String,
    pub tech_background: String,
    pub beneficial_effects: String,
    pub protection_points: String,
    pub optimization_type: OptimizationType,
    content_blocks: Vec<ContentBlock>,
    keywords: Vec<KeywordDefinition>,
    optimization_status: std::collections::HashMap<Uuid, OptimizationStatus>,
    history: History<HistoryEntry>,
    ai_warnings: Vec<AiWarning>,
    busy: HashSet<Panel>,
}

impl DisclosureWorkflow {
    pub fn new() -> Self {
        Self {
            step: Step::BasicInfo,
            invention_name: String::new(),
            contact_person: String::new(),
            application_type: None,
            technical_field: String::new(),
            existing_problems: String::new(),
            tech_background: String::new(),
            beneficial_effects: String::new(),
            protection_points: String::new(),
            optimization_type: OptimizationType::default(),
            content_blocks: vec![ContentBlock::new(BlockKind::Text)],
            keywords: Vec::new(),
            optimization_status: Default::default(),
            history: History::new(),
            ai_warnings: Vec::new(),
            busy: HashSet::new(),
        }
    }

    pub fn next_step(&mut self) -> Step {
        self.step = self.step.next();
        self.step
    }

    pub fn prev_step(&mut self) -> Step {
        self.step = self.step.prev();
        self.step
    }

    pub fn is_busy(&self, panel: Panel) -> bool {
        self.busy.contains(&panel)
    }

    pub fn history(&self) -> &History<HistoryEntry> {
        &self.history
    }

    /// Warnings from the last full rewrite.
    pub fn ai_warnings(&self) -> &[AiWarning] {
        &self.ai_warnings
    }

    /// Puts the optimized text of history entry `index` back into its block
    /// and selects the optimization type it was produced with.
    pub fn restore_from_history(&mut self, index: usize) -> Result<HistoryEntry, WorkflowError> {
        let entry = self
            .history
            .get(index)
            .cloned()
            .ok_or_else(|| WorkflowError::Validation("历史记录不存在".into()))?;
        let id = entry
            .block
            .ok_or_else(|| WorkflowError::Validation("该历史记录没有关联的内容块".into()))?;
        if self.is_busy(Panel::Block(id)) {
            return Err(WorkflowError::Busy(Panel::Block(id)));
        }
        self.block_mut(id)?.content = entry.optimized.clone();
        self.optimization_type = entry.optimization_type;
        self.optimization_status.insert(id, OptimizationStatus::Success);
        info!(index, block = %id, "Restored from history");
        Ok(entry)
    }

    // -- content blocks ----------------------------------------------------

    pub fn content_blocks(&self) -> &[ContentBlock] {
        &self.content_blocks
    }

    pub fn add_content_block(&mut self, kind: BlockKind) -> Uuid {
        let block = ContentBlock::new(kind);
        let id = block.id;
        self.content_blocks.push(block);
        id
    }

    pub fn update_content_block(&mut self, id: Uuid, content: impl Into<String>) -> Result<(), WorkflowError> {
        self.block_mut(id)?.content = content.into();
        Ok(())
    }

    /// Records the file name of an image for an image block.
    pub fn attach_image(&mut self, id: Uuid, file_name: impl Into<String>) -> Result<(), WorkflowError> {
        let block = self.block_mut(id)?;
        if block.kind != BlockKind::Image {
            return Err(WorkflowError::Validation("只能为图片块上传图片".into()));
        }
        block.content = file_name.into();
        Ok(())
    }

    /// Returns false when `id` is the only block left.
    pub fn delete_content_block(&mut self, id: Uuid) -> bool {
        if self.content_blocks.len() <= 1 {
            return false;
        }
        let before = self.content_blocks.len();
        self.content_blocks.retain(|block| block.id != id);
        self.optimization_status.remove(&id);
        self.content_blocks.len() != before
    }

    pub fn optimization_status(&self, id: Uuid) -> OptimizationStatus {
        self.optimization_status.get(&id).copied().unwrap_or_default()
    }

    /// Text blocks joined by newlines.
    pub fn tech_solution_text(&self) -> String {
        self.content_blocks
            .iter()
            .filter(|block| block.kind == BlockKind::Text)
            .map(|block| block.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn block_mut(&mut self, id: Uuid) -> Result<&mut ContentBlock, WorkflowError> {
        self.content_blocks
            .iter_mut()
            .find(|block| block.id == id)
            .ok_or(WorkflowError::UnknownBlock(id))
    }

    // -- keywords ----------------------------------------------------------

    pub fn keywords(&self) -> &[KeywordDefinition] {
        &self.keywords
    }

    pub fn add_keyword(&mut self) -> usize {
        self.keywords.push(KeywordDefinition::default());
        self.keywords.len() - 1
    }

    pub fn update_keyword(&mut self, index: usize, keyword: KeywordDefinition) -> bool {
        match self.keywords.get_mut(index) {
            Some(slot) => {
                *slot = keyword;
                true
            }
            None => false,
        }
    }

    pub fn delete_keyword(&mut self, index: usize) -> Option<KeywordDefinition> {
        (index < self.keywords.len()).then(|| self.keywords.remove(index))
    }

    /// Appends each suggestion whose term is not listed yet.
    pub fn merge_keywords(&mut self, suggested: impl IntoIterator<Item = KeywordDefinition>) {
        for keyword in suggested {
            if !self.keywords.iter().any(|kw| kw.term == keyword.term) {
                self.keywords.push(keyword);
            }
        }
    }

    // -- panel guard -------------------------------------------------------

    fn claim(&mut self, panel: Panel) -> Result<(), WorkflowError> {
        if !self.busy.insert(panel) {
            return Err(WorkflowError::Busy(panel));
        }
        Ok(())
    }

    fn release(&mut self, panel: Panel) {
        self.busy.remove(&panel);
    }

    /// Frees `panel` after its handle was cancelled or dropped without a
    /// `complete_*` call. A loading block goes back to idle.
    pub fn abort(&mut self, panel: Panel) {
        self.release(panel);
        if let Panel::Block(id) = panel {
            if let Some(status) = self.optimization_status.get_mut(&id) {
                if *status == OptimizationStatus::Loading {
                    *status = OptimizationStatus::Idle;
                }
            }
        }
    }

    // -- background --------------------------------------------------------

    pub fn start_background(&mut self, client: &StreamingClient) -> Result<StreamHandle, WorkflowError> {
        if self.invention_name.trim().is_empty() || self.technical_field.trim().is_empty() {
            return Err(WorkflowError::Validation("请先填写发明名称和技术领域".into()));
        }
        self.claim(Panel::Background)?;
        Ok(client.start(StreamRequest::background(
            &self.invention_name,
            &self.technical_field,
            &self.existing_problems,
        )))
    }

    /// Applies a finished background stream. Earlier text is kept on failure.
    pub fn complete_background(&mut self, session: StreamSession) -> Result<(), WorkflowError> {
        self.release(Panel::Background);
        self.tech_background = finished_text(session)?;
        info!(chars = self.tech_background.chars().count(), "Background generated");
        Ok(())
    }

    pub async fn generate_background(&mut self, client: &StreamingClient) -> Result<(), WorkflowError> {
        let session = self.start_background(client)?.finish().await;
        self.complete_background(session)
    }

    // -- block optimization -----------------------------------------------

    pub fn start_block_optimization(
        &mut self,
        client: &StreamingClient,
        id: Uuid,
    ) -> Result<StreamHandle, WorkflowError> {
        let content = self.block_mut(id)?.content.clone();
        if content.trim().is_empty() {
            return Err(WorkflowError::Validation("请先输入内容".into()));
        }
        self.claim(Panel::Block(id))?;
        self.optimization_status.insert(id, OptimizationStatus::Loading);
        Ok(client.start(StreamRequest::optimization(&content, self.optimization_type)))
    }

    /// On success the block text is replaced and the change recorded in history;
    /// on failure the original text stays and the block is marked as errored.
    pub fn complete_block_optimization(
        &mut self,
        id: Uuid,
        session: StreamSession,
    ) -> Result<(), WorkflowError> {
        self.release(Panel::Block(id));
        let optimization_type = self.optimization_type;
        let result = finished_text(session);
        let status = match &result {
            Ok(_) => OptimizationStatus::Success,
            Err(WorkflowError::Cancelled) => OptimizationStatus::Idle,
            Err(_) => OptimizationStatus::Error,
        };
        self.optimization_status.insert(id, status);
        let optimized = result?;

        let block = self.block_mut(id)?;
        if !optimized.trim().is_empty() && optimized != block.content {
            let original = std::mem::replace(&mut block.content, optimized.clone());
            self.history
                .push(HistoryEntry::new(original, optimized, optimization_type).for_block(id));
        }
        Ok(())
    }

    pub async fn optimize_block(&mut self, client: &StreamingClient, id: Uuid) -> Result<(), WorkflowError> {
        let session = self.start_block_optimization(client, id)?.finish().await;
        self.complete_block_optimization(id, session)
    }

    /// Optimizes every non-blank text block in order, merges the suggested
    /// keywords and records warnings about the submitted text.
    ///
    /// A block whose request fails keeps its text and is marked as errored;
    /// the remaining blocks still run.
    pub async fn rewrite_all(&mut self, client: &StreamingClient) -> Result<&[AiWarning], WorkflowError> {
        let text_blocks: Vec<(Uuid, String)> = self
            .content_blocks
            .iter()
            .filter(|block| block.kind == BlockKind::Text && !block.content.trim().is_empty())
            .map(|block| (block.id, block.content.clone()))
            .collect();
        if text_blocks.is_empty() {
            return Err(WorkflowError::Validation("请先输入技术方案内容".into()));
        }
        if let Some((id, _)) = text_blocks.iter().find(|(id, _)| self.is_busy(Panel::Block(*id))) {
            return Err(WorkflowError::Busy(Panel::Block(*id)));
        }

        let mut failed = 0;
        for (id, _) in &text_blocks {
            match self.optimize_block(client, *id).await {
                Ok(()) => {}
                Err(WorkflowError::Consumer(err)) => {
                    failed += 1;
                    warn!(block = %id, error = %err, "Block rewrite failed");
                }
                Err(err) => return Err(err),
            }
        }

        self.merge_keywords(SUGGESTED_KEYWORDS.iter().map(|(term, definition)| {
            KeywordDefinition {
                term: term.to_string(),
                definition: definition.to_string(),
            }
        }));
        let submitted: String = text_blocks.iter().map(|(_, text)| text.as_str()).collect();
        self.ai_warnings = detect_warnings(&submitted, &self.content_blocks);
        info!(
            blocks = text_blocks.len(),
            failed,
            warnings = self.ai_warnings.len(),
            "Rewrite finished"
        );
        Ok(&self.ai_warnings)
    }

    // -- effects -----------------------------------------------------------

    pub fn start_effects(&mut self, client: &StreamingClient) -> Result<StreamHandle, WorkflowError> {
        let solution = self.tech_solution_text();
        if self.tech_background.trim().is_empty() || solution.trim().is_empty() {
            return Err(WorkflowError::Validation("请先完成技术背景和技术方案".into()));
        }
        self.claim(Panel::Effects)?;
        Ok(client.start(StreamRequest::technical_effects(&self.tech_background, &solution)))
    }

    pub fn complete_effects(&mut self, session: StreamSession) -> Result<(), WorkflowError> {
        self.release(Panel::Effects);
        let text = finished_text(session)?;
        let (effects, points) = split_effects(&text);
        self.beneficial_effects = effects;
        self.protection_points = points;
        Ok(())
    }

    pub async fn generate_effects(&mut self, client: &StreamingClient) -> Result<(), WorkflowError> {
        let session = self.start_effects(client)?.finish().await;
        self.complete_effects(session)
    }
}

impl Default for DisclosureWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

fn finished_text(session: StreamSession) -> Result<String, WorkflowError> {
    match session.state {
        StreamState::Completed => Ok(session.buffer),
        StreamState::Cancelled => Err(WorkflowError::Cancelled),
        StreamState::Failed | StreamState::Active => {
            let err = session
                .error
                .unwrap_or_else(|| ConsumerError::Transport("stream ended without a result".into()));
            warn!(error = %err, partial_chars = session.buffer.chars().count(), "Stream did not complete");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use patentflow_completion::{CompletionSource, MockBehavior, MockModel};
    use patentflow_core::{CompletionError, ModelConfig};
    use patentflow_gateway::GatewayState;
    use tokio::net::TcpListener;

    async fn spawn_gateway(model: Arc<MockModel>) -> StreamingClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = GatewayState::new(CompletionSource::new(model, Arc::new(ModelConfig::default())))
            .with_char_delay(Duration::ZERO);
        tokio::spawn(patentflow_gateway::serve(listener, state, futures::future::pending()));
        StreamingClient::new(format!("http://{addr}"))
    }

    fn completed(text: &str) -> StreamSession {
        let mut session = StreamSession::new();
        session.append(text);
        session.complete();
        session
    }

    #[test]
    fn steps_are_bounded() {
        let mut workflow = DisclosureWorkflow::new();
        assert_eq!(workflow.prev_step(), Step::BasicInfo);
        for _ in 0..10 {
            workflow.next_step();
        }
        assert_eq!(workflow.step.number(), 5);
    }

    #[test]
    fn last_block_cannot_be_deleted() {
        let mut workflow = DisclosureWorkflow::new();
        let first = workflow.content_blocks()[0].id;
        assert!(!workflow.delete_content_block(first));

        let image = workflow.add_content_block(BlockKind::Image);
        workflow.attach_image(image, "flow.png").unwrap();
        assert!(workflow.attach_image(first, "x.png").is_err());
        workflow.update_content_block(first, "步骤一").unwrap();
        assert_eq!(workflow.tech_solution_text(), "步骤一");
        assert!(workflow.delete_content_block(first));
        assert_eq!(workflow.content_blocks().len(), 1);
        assert!(!workflow.delete_content_block(image));
    }

    #[test]
    fn keywords_are_editable_by_index() {
        let mut workflow = DisclosureWorkflow::new();
        let index = workflow.add_keyword();
        let keyword = KeywordDefinition {
            term: "域控制器".into(),
            definition: "集中控制多个车载功能的计算单元".into(),
        };
        assert!(workflow.update_keyword(index, keyword.clone()));
        assert!(!workflow.update_keyword(5, keyword.clone()));
        assert_eq!(workflow.delete_keyword(index), Some(keyword));
        assert_eq!(workflow.delete_keyword(0), None);
    }

    #[test]
    fn split_effects_separates_sections() {
        let text = format!("{BENEFICIAL_EFFECTS_HEADER}1. 降低延迟{PROTECTION_POINTS_HEADER}1. 统一调度");
        assert_eq!(
            split_effects(&text),
            ("1. 降低延迟".to_string(), "1. 统一调度".to_string())
        );
        assert_eq!(split_effects("只有效果"), ("只有效果".to_string(), String::new()));
    }

    #[test]
    fn failed_optimization_keeps_original_text() {
        let mut workflow = DisclosureWorkflow::new();
        let id = workflow.content_blocks()[0].id;
        workflow.update_content_block(id, "原文").unwrap();

        let mut failed = StreamSession::new();
        failed.append("半截");
        failed.fail(ConsumerError::Transport("reset".into()));
        assert!(workflow.complete_block_optimization(id, failed).is_err());
        assert_eq!(workflow.content_blocks()[0].content, "原文");
        assert_eq!(workflow.optimization_status(id), OptimizationStatus::Error);
        assert!(workflow.history().is_empty());

        workflow.complete_block_optimization(id, completed("优化文")).unwrap();
        assert_eq!(workflow.content_blocks()[0].content, "优化文");
        assert_eq!(workflow.optimization_status(id), OptimizationStatus::Success);
        assert_eq!(workflow.history().latest().unwrap().original, "原文");
    }

    #[tokio::test]
    async fn validation_happens_before_any_request() {
        let model = Arc::new(MockModel::new("mock"));
        let client = spawn_gateway(model.clone()).await;
        let mut workflow = DisclosureWorkflow::new();
        let id = workflow.content_blocks()[0].id;

        assert!(matches!(
            workflow.generate_background(&client).await,
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            workflow.optimize_block(&client, id).await,
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            workflow.generate_effects(&client).await,
            Err(WorkflowError::Validation(_))
        ));
        assert!(workflow.busy.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn busy_panel_rejects_a_second_request() {
        let model = Arc::new(MockModel::new("mock").with_fragments(["背景技术正文"]));
        let client = spawn_gateway(model).await;
        let mut workflow = DisclosureWorkflow::new();
        workflow.invention_name = "智能座舱".into();
        workflow.technical_field = "汽车电子".into();

        let handle = workflow.start_background(&client).unwrap();
        assert!(matches!(
            workflow.start_background(&client),
            Err(WorkflowError::Busy(Panel::Background))
        ));
        workflow.complete_background(handle.finish().await).unwrap();
        assert_eq!(workflow.tech_background, "背景技术正文");
        assert!(!workflow.is_busy(Panel::Background));
    }

    #[tokio::test]
    async fn full_drafting_pass() {
        let model = Arc::new(
            MockModel::new("mock")
                .then(MockBehavior::fragments(["现有座舱", "交互割裂"]))
                .then(MockBehavior::fragments(["优化后的", "方案"]))
                .then(MockBehavior::fragments(["响应更快"]))
                .then(MockBehavior::fragments(["统一调度"])),
        );
        let client = spawn_gateway(model.clone()).await;
        let mut workflow = DisclosureWorkflow::new();
        workflow.invention_name = "智能座舱".into();
        workflow.technical_field = "汽车电子".into();
        workflow.optimization_type = OptimizationType::Legal;

        workflow.generate_background(&client).await.unwrap();
        assert_eq!(workflow.tech_background, "现有座舱交互割裂");

        let id = workflow.content_blocks()[0].id;
        workflow.update_content_block(id, "原始方案").unwrap();
        workflow.optimize_block(&client, id).await.unwrap();
        assert_eq!(workflow.tech_solution_text(), "优化后的方案");
        assert_eq!(
            workflow.history().latest().unwrap().optimization_type,
            OptimizationType::Legal
        );

        workflow.generate_effects(&client).await.unwrap();
        assert_eq!(workflow.beneficial_effects, "响应更快");
        assert_eq!(workflow.protection_points, "统一调度");
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn failed_effects_leave_previous_values() {
        let model = Arc::new(MockModel::new("mock").with_default(MockBehavior::FailOpen(
            CompletionError::upstream(Some(503), "busy"),
        )));
        let client = spawn_gateway(model).await;
        let mut workflow = DisclosureWorkflow::new();
        workflow.tech_background = "背景".into();
        let id = workflow.content_blocks()[0].id;
        workflow.update_content_block(id, "方案").unwrap();
        workflow.beneficial_effects = "旧效果".into();

        let err = workflow.generate_effects(&client).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Consumer(ConsumerError::Status { code: 500, .. })
        ));
        assert_eq!(workflow.beneficial_effects, "旧效果");
        assert!(!workflow.is_busy(Panel::Effects));
    }

    #[test]
    fn detailed_solution_with_attached_images_has_no_warnings() {
        let mut workflow = DisclosureWorkflow::new();
        let image = workflow.add_content_block(BlockKind::Image);
        workflow.attach_image(image, "architecture.png").unwrap();
        let text = "车载域控制器通过以太网汇聚多路传感器数据，".repeat(6);
        assert!(detect_warnings(&text, workflow.content_blocks()).is_empty());

        let blank_image = workflow.add_content_block(BlockKind::Image);
        let kinds: Vec<_> = detect_warnings(&text, workflow.content_blocks())
            .into_iter()
            .map(|w| w.kind)
            .collect();
        assert_eq!(kinds, vec![AiWarningKind::Image]);
        assert!(workflow.delete_content_block(blank_image));
    }

    #[test]
    fn restore_puts_an_earlier_result_back() {
        let mut workflow = DisclosureWorkflow::new();
        let id = workflow.content_blocks()[0].id;
        workflow.update_content_block(id, "原文").unwrap();

        workflow.optimization_type = OptimizationType::Detailed;
        workflow.complete_block_optimization(id, completed("详细版")).unwrap();
        workflow.optimization_type = OptimizationType::Concise;
        workflow.complete_block_optimization(id, completed("精简版")).unwrap();
        assert_eq!(workflow.history().len(), 2);

        let entry = workflow.restore_from_history(1).unwrap();
        assert_eq!(entry.original, "原文");
        assert_eq!(workflow.content_blocks()[0].content, "详细版");
        assert_eq!(workflow.optimization_type, OptimizationType::Detailed);
        assert_eq!(workflow.history().len(), 2);

        assert!(matches!(
            workflow.restore_from_history(2),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn restore_needs_the_block_to_still_exist() {
        let mut workflow = DisclosureWorkflow::new();
        let id = workflow.content_blocks()[0].id;
        workflow.add_content_block(BlockKind::Text);
        workflow.update_content_block(id, "原文").unwrap();
        workflow.complete_block_optimization(id, completed("优化文")).unwrap();
        assert!(workflow.delete_content_block(id));
        assert!(matches!(
            workflow.restore_from_history(0),
            Err(WorkflowError::UnknownBlock(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn rewrite_all_optimizes_text_blocks_and_flags_gaps() {
        let model = Arc::new(
            MockModel::new("mock")
                .then(MockBehavior::fragments(["座舱域控制器", "统一调度"]))
                .then(MockBehavior::FailOpen(CompletionError::Configuration(
                    "no key".into(),
                ))),
        );
        let client = spawn_gateway(model.clone()).await;
        let mut workflow = DisclosureWorkflow::new();
        let first = workflow.content_blocks()[0].id;
        workflow.update_content_block(first, "座舱等模块").unwrap();
        workflow.add_content_block(BlockKind::Text);
        workflow.add_content_block(BlockKind::Image);
        let second = workflow.add_content_block(BlockKind::Text);
        workflow.update_content_block(second, "语音交互").unwrap();
        workflow.add_keyword();
        workflow.update_keyword(
            0,
            KeywordDefinition {
                term: "实施例".into(),
                definition: "自定义释义".into(),
            },
        );

        let kinds: Vec<_> = workflow
            .rewrite_all(&client)
            .await
            .unwrap()
            .iter()
            .map(|w| w.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![AiWarningKind::Brief, AiWarningKind::Image, AiWarningKind::Unclear]
        );
        assert_eq!(model.calls(), 2);

        assert_eq!(workflow.content_blocks()[0].content, "座舱域控制器统一调度");
        assert_eq!(workflow.optimization_status(first), OptimizationStatus::Success);
        assert_eq!(workflow.content_blocks()[3].content, "语音交互");
        assert_eq!(workflow.optimization_status(second), OptimizationStatus::Error);

        let terms: Vec<_> = workflow.keywords().iter().map(|kw| kw.term.as_str()).collect();
        assert_eq!(terms, vec!["实施例", "技术方案", "权利要求"]);
        assert_eq!(workflow.keywords()[0].definition, "自定义释义");
        assert_eq!(workflow.ai_warnings().len(), 3);
        assert!(workflow.busy.is_empty());
    }

    #[tokio::test]
    async fn rewrite_all_needs_some_text() {
        let model = Arc::new(MockModel::new("mock"));
        let client = spawn_gateway(model.clone()).await;
        let mut workflow = DisclosureWorkflow::new();
        workflow.add_content_block(BlockKind::Image);

        assert!(matches!(
            workflow.rewrite_all(&client).await,
            Err(WorkflowError::Validation(_))
        ));
        assert!(workflow.keywords().is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn abandoned_handle_can_be_aborted() {
        let model = Arc::new(MockModel::new("mock").with_default(MockBehavior::Hang));
        let client = spawn_gateway(model).await;
        let mut workflow = DisclosureWorkflow::new();
        let id = workflow.content_blocks()[0].id;
        workflow.update_content_block(id, "原文").unwrap();

        let handle = workflow.start_block_optimization(&client, id).unwrap();
        handle.cancel();
        drop(handle);
        assert!(workflow.is_busy(Panel::Block(id)));
        assert_eq!(workflow.optimization_status(id), OptimizationStatus::Loading);

        workflow.abort(Panel::Block(id));
        assert!(!workflow.is_busy(Panel::Block(id)));
        assert_eq!(workflow.optimization_status(id), OptimizationStatus::Idle);

        let retry = workflow.start_block_optimization(&client, id).unwrap();
        retry.cancel();
        let session = retry.finish().await;
        assert!(matches!(
            workflow.complete_block_optimization(id, session),
            Err(WorkflowError::Cancelled)
        ));
        assert!(!workflow.is_busy(Panel::Block(id)));
        assert_eq!(workflow.optimization_status(id), OptimizationStatus::Idle);
        assert_eq!(workflow.content_blocks()[0].content, "原文");
    }
}
