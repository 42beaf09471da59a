//! Dashboard page
//!
//! Single HTML page (vanilla JS, no frameworks) showing the day's shift
//! records and what waits for review. The API does the work; the page only
//! renders it.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(dashboard_page))
}

/// GET /
async fn dashboard_page() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Quality Verification</title>
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 960px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.5;
        }
        h1 {
            color: #333;
            border-bottom: 2px solid #0066cc;
            padding-bottom: 10px;
        }
        .cards { display: flex; gap: 12px; flex-wrap: wrap; }
        .card {
            flex: 1 1 120px;
            border: 1px solid #ddd;
            border-radius: 4px;
            padding: 12px;
            text-align: center;
        }
        .card .value { font-size: 28px; font-weight: bold; }
        .completed { color: #006100; }
        .rejected { color: #9c0006; }
        table { border-collapse: collapse; width: 100%; margin-top: 20px; }
        th, td { border: 1px solid #ddd; padding: 6px 8px; text-align: left; }
        th { background: #f2f2f2; }
        .error { color: #9c0006; }
        .button {
            display: inline-block;
            padding: 6px 14px;
            background: #0066cc;
            color: white;
            border: none;
            border-radius: 4px;
            cursor: pointer;
        }
    </style>
</head>
<body>
    <h1>Quality Verification</h1>
    <p>
        User <input id="user" size="12">
        Date <input id="date" type="date">
        <button class="button" onclick="refresh()">Show</button>
        <a id="export" class="button" href="#" onclick="download(event)">Export .xlsx</a>
    </p>
    <p id="shift"></p>
    <p id="error" class="error"></p>

    <div class="cards">
        <div class="card"><div class="value" id="total">-</div>Records</div>
        <div class="card"><div class="value" id="in_progress">-</div>In progress</div>
        <div class="card completed"><div class="value" id="completed">-</div>Completed</div>
        <div class="card rejected"><div class="value" id="rejected">-</div>Rejected</div>
        <div class="card"><div class="value" id="awaiting_supervisor">-</div>Awaiting supervisor</div>
        <div class="card"><div class="value" id="awaiting_quality">-</div>Awaiting quality</div>
        <div class="card"><div class="value" id="awaiting_operator">-</div>Returned to operator</div>
    </div>

    <table>
        <thead><tr><th>Shift</th><th>Status</th><th>Supervisor</th><th>Quality</th><th>Operator</th></tr></thead>
        <tbody id="records"></tbody>
    </table>

    <script>
        const userInput = document.getElementById('user');
        const dateInput = document.getElementById('date');
        userInput.value = localStorage.getItem('qv-user') || '';

        async function api(path) {
            const response = await fetch(path, { headers: { 'X-QV-User': userInput.value } });
            const body = await response.json();
            if (!response.ok) {
                throw new Error(body.error ? body.error.message : response.statusText);
            }
            return body;
        }

        function flag(value) { return value ? 'yes' : ''; }

        async function refresh() {
            localStorage.setItem('qv-user', userInput.value);
            document.getElementById('error').textContent = '';
            try {
                const shift = await api('/api/shift/current');
                if (!dateInput.value) { dateInput.value = shift.date; }
                document.getElementById('shift').textContent =
                    'Current shift ' + shift.shift + ' (' + shift.start + ' to ' + shift.end + ')';

                const date = dateInput.value;
                const summary = await api('/api/reports/dashboard?date=' + date);
                for (const key of ['total', 'in_progress', 'completed', 'rejected',
                                   'awaiting_supervisor', 'awaiting_quality', 'awaiting_operator']) {
                    document.getElementById(key).textContent = summary[key];
                }

                const records = await api('/api/verifications?date=' + date);
                const rows = records.map(r =>
                    '<tr><td>' + r.shift + '</td><td>' + r.status + '</td><td>' +
                    flag(r.notifications.supervisor) + '</td><td>' +
                    flag(r.notifications.quality) + '</td><td>' +
                    flag(r.notifications.operator) + '</td></tr>');
                document.getElementById('records').innerHTML = rows.join('');
            } catch (err) {
                document.getElementById('error').textContent = err.message;
            }
        }

        async function download(event) {
            event.preventDefault();
            const date = dateInput.value;
            const response = await fetch('/api/export/checklists.xlsx?from=' + date + '&to=' + date,
                                         { headers: { 'X-QV-User': userInput.value } });
            if (!response.ok) {
                document.getElementById('error').textContent = 'Export failed';
                return;
            }
            const link = document.createElement('a');
            link.href = URL.createObjectURL(await response.blob());
            link.download = 'checklists_' + date + '.xlsx';
            link.click();
        }

        if (userInput.value) { refresh(); }
    </script>
</body>
</html>
"##;
