// Prompt templates for the document agents.
//
// Every agent asks for JSON and spells out the exact shape it will parse, so
// the model's output can be deserialized without guesswork.

use genie_core::estimation::UseCaseRecord;
use genie_core::workspace::DocType;

// ---------------------------------------------------------------------------
// System prompts
// ---------------------------------------------------------------------------

/// System prompt for workspace generation.
pub fn workspace_system_prompt() -> String {
    "You are a government document intelligence assistant. You turn briefs \
     (terms of reference, needs assessments, research papers, spreadsheets, \
     government templates) into structured, decision-ready project documents.\n\
     \n\
     Rules:\n\
     - Use formal Indonesian government register suitable for director-level review.\n\
     - Never invent regulations, figures or legal references that are not in the input.\n\
     - Keep each document's sections inside that document; never mix them.\n\
     - Tables carry a `type`: UCP_ACTOR for actor inventories \
       [No, Actor, Classification, Weight], UCP_USECASE for use-case inventories \
       [No, Use Case, Type, Transactions, Weight], RAB for cost tables, \
       SCHEDULE for timelines, GENERIC otherwise.\n\
     - Leave RAB table rows empty; costs are computed outside the model."
        .to_string()
}

/// System prompt for interactive chat about a project.
pub fn chat_system_prompt(context: &str) -> String {
    format!(
        "You are an assistant for a government IT project team. Answer \
         concisely and ground every answer in the project context below. \
         Cost figures in the context are computed; do not recompute them.\n\
         \n\
         PROJECT CONTEXT:\n{context}"
    )
}

// ---------------------------------------------------------------------------
// Agent prompts
// ---------------------------------------------------------------------------

pub fn build_workspace_prompt(input: &str, doc_type: DocType) -> String {
    format!(
        "INPUT CONTEXT:\n\
         Document type: {doc_type}\n\
         Content:\n\"\"\"\n{input}\n\"\"\"\n\
         \n\
         Generate WorkspaceDocument JSON for: Kajian Kebutuhan (type KAJIAN), \
         Dokumen Penelitian (type RESEARCH), BRD, FSD and Project Charter \
         (type CHARTER). If the content implies a spreadsheet, government \
         template or research paper, generate those as well.\n\
         \n\
         OUTPUT JSON: an object mapping document id to document:\n\
         {{\n\
           \"<doc-id>\": {{\n\
             \"id\": \"string\",\n\
             \"type\": \"TOR|KAJIAN|RESEARCH|BRD|CHARTER|FSD|LEGAL|SPREADSHEET|GOVT_TEMPLATE|ACADEMIC_PAPER\",\n\
             \"title\": \"string\",\n\
             \"status\": \"DRAFT\",\n\
             \"version\": \"1.0\",\n\
             \"sections\": [{{\n\
               \"id\": \"string\", \"title\": \"string\", \"order\": 0,\n\
               \"lastModified\": \"ISO-8601\",\n\
               \"blocks\": [{{ \"id\": \"string\", \"type\": \"TEXT|TABLE|METRIC\", \"content\": \"string or table\" }}]\n\
             }}]\n\
           }}\n\
         }}\n\
         Table content: {{ \"id\": \"string\", \"title\": \"string\", \"headers\": [\"string\"], \
         \"rows\": [[\"string\"]], \"type\": \"GENERIC|UCP_ACTOR|UCP_USECASE|RAB|SCHEDULE\" }}"
    )
}

pub fn build_brief_prompt(input: &str, doc_type: DocType) -> String {
    format!(
        "TASK: Extract the project brief.\n\
         Input document type: {doc_type}\n\
         Content:\n\"\"\"\n{input}\n\"\"\"\n\
         \n\
         OUTPUT JSON:\n\
         {{\n\
           \"project_name\": \"string (formal title)\",\n\
           \"executive_summary\": \"string (background and objectives)\",\n\
           \"objectives\": [\"string\"],\n\
           \"legal_basis\": [\"string\"]\n\
         }}"
    )
}

pub fn build_architecture_prompt(project_name: &str) -> String {
    format!(
        "Produce a precise actor and use-case inventory for the system \"{project_name}\".\n\
         \n\
         RULES:\n\
         1. Classify every actor as Simple (another system via API), Average \
            (system via protocol or a text interface) or Complex (human via GUI).\n\
         2. Give every use case an estimated transaction count.\n\
         \n\
         OUTPUT JSON:\n\
         {{\n\
           \"actors\": [\"string\"],\n\
           \"detailed_actors\": [{{\"name\": \"string\", \"type\": \"Simple|Average|Complex\", \"desc\": \"string\"}}],\n\
           \"use_cases\": [{{\"code\": \"UC-001\", \"name\": \"string\", \"classification\": \"Simple|Average|Complex\", \"actor\": \"string\", \"transactions\": 0}}],\n\
           \"modules\": [\"string\"],\n\
           \"integrations\": [\"string\"],\n\
           \"security_level\": \"string\",\n\
           \"data_classification\": \"string\"\n\
         }}"
    )
}

pub fn build_review_prompt(context: &str) -> String {
    format!(
        "ACT AS: Director of Information Technology.\n\
         TASK: Review this project proposal before signature.\n\
         \n\
         PROJECT CONTEXT:\n{context}\n\
         \n\
         CRITERIA:\n\
         1. Is the budget justified by the business value?\n\
         2. Are the risks acceptable for a government system?\n\
         3. Is the timeline realistic?\n\
         4. Is it aligned with strategic goals?\n\
         \n\
         OUTPUT JSON:\n\
         {{\n\
           \"readinessScore\": 0,\n\
           \"status\": \"READY_FOR_SIGNATURE|NEEDS_REVISION|CRITICAL_GAPS\",\n\
           \"findings\": [{{\"section\": \"string\", \"severity\": \"CRITICAL|MAJOR|MINOR\", \
         \"issue\": \"string\", \"recommendation\": \"string\"}}]\n\
         }}"
    )
}

pub fn build_refine_prompt(record: &UseCaseRecord, instruction: &str) -> String {
    format!(
        "ROLE: Senior system analyst (Use Case Points).\n\
         TASK: Revise one use case according to the instruction.\n\
         \n\
         CURRENT USE CASE:\n\
         name: {}\n\
         type: {}\n\
         transactions: {}\n\
         \n\
         INSTRUCTION:\n\"{instruction}\"\n\
         \n\
         OUTPUT JSON ONLY:\n\
         {{ \"name\": \"string\", \"type\": \"Simple|Average|Complex\", \"transactions\": 0 }}",
        record.name, record.classification, record.transaction_count
    )
}
