//! Prompt builders for the analysis agents
//!
//! All prompts are in Chinese, matching the target market (A-share stocks)
//! and the tone of the generated reports. Each analyst prompt embeds the
//! wall-clock time captured at run start so the model anchors "latest" and
//! "recent" to the actual analysis date rather than its training cutoff.

/// Context every analyst prompt embeds
pub struct PromptContext<'a> {
    pub company_name: &'a str,
    pub stock_code: &'a str,
    pub current_time_info: &'a str,
    pub current_date: &'a str,
}

/// Analysis request for the fundamental analyst
pub fn fundamental_request(ctx: &PromptContext<'_>) -> String {
    format!(
        "请分析{company}（股票代码：{code}）的基本面情况。

当前时间：{time_info}
当前日期：{date}

请进行以下基本面分析：
1. 获取公司基本信息和行业背景
2. 获取最新财务报表数据（资产负债表、利润表、现金流量表）
3. 分析盈利能力指标（毛利率、净利率、ROE等）
4. 分析成长能力指标（收入增长率、利润增长率等）
5. 分析运营效率指标（应收周转率、存货周转率等）
6. 分析偿债能力指标（资产负债率、流动比率等）
7. 查询历史分红情况
8. 提供基本面综合评估和投资价值分析

请使用可用的工具获取实际数据进行分析，而不是基于假设。如果某些数据无法获取，请尝试使用不同的时间周期或其他工具组合，基于可用信息提供尽可能全面的分析。",
        company = ctx.company_name,
        code = ctx.stock_code,
        time_info = ctx.current_time_info,
        date = ctx.current_date,
    )
}

/// Analysis request for the technical analyst
pub fn technical_request(ctx: &PromptContext<'_>) -> String {
    format!(
        "请分析{company}（股票代码：{code}）的技术指标。

当前时间：{time_info}
当前日期：{date}

请进行以下技术分析：
1. 获取股票基本信息和最新价格
2. 获取历史K线数据（建议获取最近3-6个月的数据）
3. 分析价格趋势和技术形态
4. 分析成交量变化
5. 计算和分析主要技术指标（如移动平均线、MACD、RSI等）
6. 识别支撑位和阻力位
7. 提供技术面总结和短期走势判断

请使用可用的工具获取实际数据进行分析，而不是基于假设。",
        company = ctx.company_name,
        code = ctx.stock_code,
        time_info = ctx.current_time_info,
        date = ctx.current_date,
    )
}

/// Analysis request for the value analyst
pub fn value_request(ctx: &PromptContext<'_>) -> String {
    format!(
        "请分析{company}（股票代码：{code}）的估值情况。

当前时间：{time_info}
当前日期：{date}

请进行以下估值分析：
1. 获取公司基本信息（市值、股价等）
2. 获取并分析主要估值指标（市盈率、市净率、市销率等）
3. 将估值指标与行业平均水平进行对比分析
4. 分析历史估值水平变化趋势
5. 获取并分析股息数据和股息收益率
6. 计算和分析内在价值
7. 提供估值总结和投资建议

请使用可用的工具获取实际数据进行分析，而不是基于假设。如果某些数据无法获取，请尝试使用不同的工具或参数组合，基于可用信息提供尽可能全面的分析。",
        company = ctx.company_name,
        code = ctx.stock_code,
        time_info = ctx.current_time_info,
        date = ctx.current_date,
    )
}

/// System prompt for the summarizer
///
/// Fixes the report structure so every run produces the same Markdown
/// skeleton regardless of which analyses succeeded.
pub fn summary_system_prompt(current_time_info: &str, current_date: &str) -> String {
    format!(
        "你是一个专业金融分析师，负责创建全面、深入的股票分析报告。

**重要时间信息：当前实际时间是 {time_info}**
**分析基准日期：{date}**

这是真实的当前时间，不是你的训练数据截止时间。请在生成报告时：
- 基于实际当前时间来判断数据的时效性
- 正确标注\"最新\"、\"近期\"、\"历史\"等时间概念
- 在报告中明确标注分析的时间基准点为：{date}
- 所有时间相关的描述都要基于这个实际日期

你的任务是综合三种不同的分析结果：
1. 基本面分析 - 关注财务报表、商业模式和公司基本面
2. 技术分析 - 关注价格趋势、交易量模式和技术指标
3. 估值分析 - 关注估值指标和相对价值

请创建一份结构清晰、内容连贯的报告，整合所有三种分析的见解。
即使某些分析数据不完整或缺失，也请基于可用信息提供最佳的综合分析。

报告应包含以下部分：

# [公司名称]([股票代码]) 综合分析报告

## 执行摘要
[提供简明扼要的总体分析和投资建议，包括风险等级和预期回报]

## 公司概况
[简要介绍公司的业务、行业地位、主要产品或服务]

## 基本面分析
[详细分析公司财务状况、盈利能力、成长性、资产负债情况等]

## 技术分析
[详细分析价格趋势、技术指标、支撑位和阻力位、交易量等]

## 估值分析
[详细分析估值指标、与行业平均水平比较、历史估值水平、股息收益率等]

## 综合评估
[分析不同分析方法之间的一致点和分歧点，提供更全面的投资视角]

## 风险因素
[详细分析潜在的风险因素，包括市场风险、行业风险、公司特定风险等]

## 投资建议
[提供明确的投资建议，包括目标价格、投资时间范围、适合的投资者类型等]

## 附录：数据来源与限制
[说明数据来源，以及分析过程中遇到的任何数据限制或缺失]

输出必须是有效的Markdown格式，使用适当的标题、项目符号和格式。
不要包含任何代码块标记，如```markdown或```，直接输出纯Markdown内容。

使用专业的金融语言，但保持可读性。报告应该全面且深入，包含足够的细节和数据支持，
同时聚焦于最重要的见解，帮助投资者做出决策。

**重要提醒：**
- 请在报告末尾明确标注分析基准时间：{time_info}
- 基于这个实际时间来判断所有数据的时效性
- 避免使用模糊的时间概念，要基于实际当前时间进行判断

如果某些分析数据不完整或有错误，请在报告中明确说明，并尽可能基于可用信息提供有价值的分析。",
        time_info = current_time_info,
        date = current_date,
    )
}

/// Inputs to the summarizer's user prompt
pub struct SummaryInputs<'a> {
    pub company_name: &'a str,
    pub stock_code: &'a str,
    pub user_query: &'a str,
    pub fundamental_analysis: &'a str,
    pub technical_analysis: &'a str,
    pub value_analysis: &'a str,
    pub errors: &'a [String],
}

/// User prompt for the summarizer, carrying the three analyses verbatim
pub fn summary_user_prompt(inputs: &SummaryInputs<'_>) -> String {
    let issues = if inputs.errors.is_empty() {
        String::new()
    } else {
        format!("\n\nANALYSIS ISSUES:\n{}", inputs.errors.join(". "))
    };

    format!(
        "Please create a comprehensive analysis report for {company} ({code}) based on the following analyses.

Original user query: {query}

FUNDAMENTAL ANALYSIS:
{fundamental}

TECHNICAL ANALYSIS:
{technical}

VALUE ANALYSIS:
{value}{issues}

IMPORTANT: Your output MUST be in valid Markdown format with proper headings, bullet points,
and formatting. Include a clear recommendation section at the end.

DO NOT include any code block markers like ```markdown or ``` in your output.
Just write pure Markdown content directly.",
        company = inputs.company_name,
        code = inputs.stock_code,
        query = inputs.user_query,
        fundamental = inputs.fundamental_analysis,
        technical = inputs.technical_analysis,
        value = inputs.value_analysis,
        issues = issues,
    )
}
