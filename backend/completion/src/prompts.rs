//! Prompt templates for every disclosure drafting task.

use patentflow_core::OptimizationType;

use crate::template::PromptTemplate;

/// Returned by keyword recommendation when the model is slow or unavailable.
pub const KEYWORD_FALLBACK: &str = "智能座舱、车载系统、汽车电子、人机交互、驾驶辅助、车联网、自动驾驶、座舱域控制器、车载信息娱乐系统、智能驾驶舱";

/// Placeholder used when the inventor leaves existing problems blank.
pub const DEFAULT_EXISTING_PROBLEMS: &str = "（未提供具体问题，请根据通用情况分析）";

const PATENT_AGENT: &str = "你是一位经验丰富的中国专利代理师，熟悉《专利审查指南》对技术交底书的撰写要求。只输出正文，不要寒暄或解释。";

const OPTIMIZE_STANDARD: &str = "请对以下技术方案文本进行标准优化：在保持原意的前提下统一术语、修正语病、理顺逻辑，使其兼顾专业性与可读性。\n\n技术方案：\n{text}";

const OPTIMIZE_DETAILED: &str = "请对以下技术方案文本进行详细扩展：补充各步骤的实现细节、部件之间的连接关系与工作原理，必要时给出可选实施方式。\n\n技术方案：\n{text}";

const OPTIMIZE_CONCISE: &str = "请对以下技术方案文本进行精简提炼：删除冗余表述，保留核心技术特征，用简洁准确的句子表达。\n\n技术方案：\n{text}";

const OPTIMIZE_LEGAL: &str = "请将以下技术方案文本改写为符合专利法律文书规范的表述：使用“所述”“其特征在于”等规范用语，避免口语化和不确定的措辞。\n\n技术方案：\n{text}";

const BENEFICIAL_EFFECTS: &str = "根据下面的技术背景和技术方案，分条列出本发明相对于现有技术的有益效果，每条说明效果及其对应的技术手段。\n\n技术背景：\n{technicalBackground}\n\n技术方案：\n{technicalSolution}";

const PROTECTION_POINTS: &str = "根据下面的技术背景和技术方案，归纳本发明的技术关键点和欲保护点，按重要程度排序，每条不超过两句话。\n\n技术背景：\n{technicalBackground}\n\n技术方案：\n{technicalSolution}";

const KEYWORD_EXAMINER: &str = "你是一位资深的专利审查员。";

const KEYWORD_RECOMMENDATION: &str = "请根据用户提供的核心专利关键词，生成一批高度相关、可用于专利检索或技术情报分析的扩展关联词。\n\n输入信息：\n1. 核心专利关键词：{coreKeyword}\n2. 技术领域：{technicalField}\n3. 期望关联词数量：{desiredCount}\n\n生成要求：\n1. 关联词应涵盖同义词/近义词、上下位概念、技术关联词、应用场景词等维度。\n2. 严格以纯文本、中文顿号“、”分隔的形式输出，不要编号、不要列表符号、不要额外解释。\n3. 关联词必须专业、精准，符合专利数据库的常用术语习惯。\n\n请直接输出关联词，不要有任何其他内容。";

const BACKGROUND_GENERATION: &str = "请为以下发明撰写技术交底书中的“背景技术”部分：介绍所属技术领域的现状，说明现有技术方案及其存在的缺陷，最后引出本发明要解决的技术问题。\n\n发明名称：{inventionName}\n技术领域：{technicalField}\n现有问题：{existingProblems}";

pub fn text_optimization(kind: OptimizationType) -> PromptTemplate {
    let (name, user) = match kind {
        OptimizationType::Standard => ("text-optimization-standard", OPTIMIZE_STANDARD),
        OptimizationType::Detailed => ("text-optimization-detailed", OPTIMIZE_DETAILED),
        OptimizationType::Concise => ("text-optimization-concise", OPTIMIZE_CONCISE),
        OptimizationType::Legal => ("text-optimization-legal", OPTIMIZE_LEGAL),
    };
    PromptTemplate::new(name, PATENT_AGENT, user, &["text"])
}

pub fn beneficial_effects() -> PromptTemplate {
    PromptTemplate::new(
        "beneficial-effects",
        PATENT_AGENT,
        BENEFICIAL_EFFECTS,
        &["technicalBackground", "technicalSolution"],
    )
}

pub fn protection_points() -> PromptTemplate {
    PromptTemplate::new(
        "protection-points",
        PATENT_AGENT,
        PROTECTION_POINTS,
        &["technicalBackground", "technicalSolution"],
    )
}

/// Recommendations need stable output, so sampling runs cold.
pub fn keyword_recommendation() -> PromptTemplate {
    PromptTemplate::new(
        "keyword-recommendation",
        KEYWORD_EXAMINER,
        KEYWORD_RECOMMENDATION,
        &["coreKeyword", "technicalField", "desiredCount"],
    )
    .with_temperature(0.1)
}

pub fn background_generation() -> PromptTemplate {
    PromptTemplate::new(
        "background-generation",
        PATENT_AGENT,
        BACKGROUND_GENERATION,
        &["inventionName", "technicalField", "existingProblems"],
    )
}

/// Split a `、`-separated recommendation string into trimmed, non-empty terms.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split('、')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}
